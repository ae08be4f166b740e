#[path = "../src/backup.rs"]
mod backup;

use std::fs::File;
use std::io::{Read, Write};
use std::path::PathBuf;
use std::time::{SystemTime, UNIX_EPOCH};

fn temp_dir(prefix: &str) -> PathBuf {
    let p = std::env::temp_dir().join(format!(
        "{}-{}",
        prefix,
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("clock")
            .as_nanos()
    ));
    std::fs::create_dir_all(&p).expect("create temp dir");
    p
}

fn entries() -> Vec<(String, String)> {
    vec![
        (
            "students".to_string(),
            r#"[{"id":1,"nama":"Aisyah","kelas":"5A"}]"#.to_string(),
        ),
        (
            "dailyAttendanceHistory".to_string(),
            r#"[{"date":"2024-03-04","records":[]}]"#.to_string(),
        ),
    ]
}

#[test]
fn bundle_holds_one_entry_per_storage_key() {
    let out_dir = temp_dir("attendanced-bundle-keys");
    let bundle_path = out_dir.join("backup.zip");

    let export = backup::write_bundle(&bundle_path, &entries()).expect("write bundle");
    assert_eq!(export.bundle_format, backup::BUNDLE_FORMAT_V1);
    assert_eq!(export.keys, vec!["dailyAttendanceHistory", "students"]);
    assert_eq!(export.sha256, backup::entries_sha256(&entries()));

    let f = File::open(&bundle_path).expect("open bundle");
    let mut archive = zip::ZipArchive::new(f).expect("open zip archive");
    let mut manifest = String::new();
    archive
        .by_name("manifest.json")
        .expect("manifest entry")
        .read_to_string(&mut manifest)
        .expect("read manifest");
    let manifest: serde_json::Value = serde_json::from_str(&manifest).expect("manifest json");
    assert_eq!(manifest["bundleId"], export.bundle_id.as_str());
    assert_eq!(
        manifest["keys"],
        serde_json::json!(["dailyAttendanceHistory", "students"])
    );
    let mut students = String::new();
    archive
        .by_name("storage/students.json")
        .expect("students entry")
        .read_to_string(&mut students)
        .expect("read students");
    assert!(students.contains("Aisyah"));

    let bundle = backup::read_bundle(&bundle_path).expect("read bundle");
    assert_eq!(bundle.format_detected, backup::BUNDLE_FORMAT_V1);
    assert_eq!(bundle.bundle_id.as_deref(), Some(export.bundle_id.as_str()));
    assert_eq!(bundle.entries.len(), 2);
    assert_eq!(bundle.entries[1].0, "students");

    let _ = std::fs::remove_dir_all(out_dir);
}

#[test]
fn edited_value_fails_the_checksum() {
    let out_dir = temp_dir("attendanced-bundle-tamper");
    let bundle_path = out_dir.join("tampered.zip");
    let checksum = backup::entries_sha256(&entries());
    {
        let f = File::create(&bundle_path).expect("create bundle");
        let mut zip = zip::ZipWriter::new(f);
        let opts = zip::write::FileOptions::default();
        zip.start_file("manifest.json", opts).expect("manifest entry");
        zip.write_all(
            serde_json::json!({
                "format": backup::BUNDLE_FORMAT_V1,
                "keys": ["students"],
                "sha256": checksum
            })
            .to_string()
            .as_bytes(),
        )
        .expect("write manifest");
        zip.start_file("storage/students.json", opts).expect("students entry");
        zip.write_all(b"[]").expect("write students");
        zip.finish().expect("finish zip");
    }

    let e = backup::read_bundle(&bundle_path).expect_err("mismatch");
    assert!(e.to_string().contains("checksum"));

    let _ = std::fs::remove_dir_all(out_dir);
}

#[test]
fn local_storage_dump_is_accepted() {
    let out_dir = temp_dir("attendanced-bundle-dump");
    let dump = out_dir.join("local-storage.json");
    std::fs::write(
        &dump,
        serde_json::json!({ "students": "[]", "staff": "[{\"id\":1}]" }).to_string(),
    )
    .expect("write dump");

    let bundle = backup::read_bundle(&dump).expect("read dump");
    assert_eq!(bundle.format_detected, backup::LOCAL_STORAGE_FORMAT);
    assert!(bundle.bundle_id.is_none());
    assert_eq!(bundle.entries[0], ("staff".to_string(), "[{\"id\":1}]".to_string()));

    let nested = out_dir.join("nested.json");
    std::fs::write(&nested, r#"{"students":[]}"#).expect("write nested");
    let e = backup::read_bundle(&nested).expect_err("non-string value");
    assert!(e.to_string().contains("students"));

    let _ = std::fs::remove_dir_all(out_dir);
}
