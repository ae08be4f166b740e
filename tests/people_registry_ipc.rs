mod test_support;

use serde_json::json;
use test_support::{error_code, request, request_ok, spawn_sidecar, temp_dir};

#[test]
fn registration_assigns_codes_and_delete_keeps_history() {
    let workspace = temp_dir("attendanced-people-registry");
    let (mut child, mut stdin, mut reader) = spawn_sidecar();

    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "workspace.select",
        json!({ "path": workspace.to_string_lossy() }),
    );

    let first = request_ok(
        &mut stdin,
        &mut reader,
        "2",
        "people.create",
        json!({ "kind": "staff", "name": "  Hafiz  ", "gradePosition": "DG41" }),
    );
    assert_eq!(first["person"]["name"], "Hafiz");
    assert_eq!(first["person"]["staffId"], "STF0001");
    assert_eq!(first["person"]["jawatanGred"], "DG41");
    assert_eq!(first["person"]["nama"], "Hafiz");
    let second = request_ok(
        &mut stdin,
        &mut reader,
        "3",
        "people.create",
        json!({ "kind": "staff", "name": "Ilya" }),
    );
    assert_eq!(second["person"]["staffId"], "STF0002");
    assert!(second["person"]["id"].as_i64() > first["person"]["id"].as_i64());

    let fac = request_ok(
        &mut stdin,
        &mut reader,
        "4",
        "people.create",
        json!({ "kind": "facilitators", "name": "Jamal" }),
    );
    assert_eq!(fac["person"]["facilitatorId"], "FAC0001");

    let staff = request_ok(&mut stdin, &mut reader, "5", "people.list", json!({ "kind": "staff" }));
    assert_eq!(staff["people"].as_array().map(|a| a.len()), Some(2));

    let bad_kind = request(
        &mut stdin,
        &mut reader,
        "6",
        "people.list",
        json!({ "kind": "parents" }),
    );
    assert_eq!(error_code(&bad_kind), Some("bad_params"));

    let empty_name = request(
        &mut stdin,
        &mut reader,
        "7",
        "students.create",
        json!({ "name": "   " }),
    );
    assert_eq!(error_code(&empty_name), Some("bad_params"));

    let student = request_ok(
        &mut stdin,
        &mut reader,
        "8",
        "students.create",
        json!({ "name": "Kamala", "guardianName": "Lim", "sekolah": "SK Seri" }),
    );
    let sid = student["student"]["id"].as_i64().expect("id");
    assert_eq!(student["student"]["kelas"], "5A");
    assert_eq!(student["student"]["namaWaris"], "Lim");
    assert_eq!(student["student"]["sekolah"], "SK Seri");
    assert!(student["student"].get("guardianName").is_none());
    assert!(student["student"]["noMatrik"]
        .as_str()
        .map(|m| m.ends_with("001") && m.len() == 7)
        .unwrap_or(false));

    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "9",
        "attendance.save",
        json!({ "date": "2024-07-01" }),
    );
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "10",
        "students.delete",
        json!({ "studentId": sid }),
    );
    let history = request_ok(&mut stdin, &mut reader, "11", "attendance.history", json!({}));
    assert_eq!(history["entries"][0]["recordCount"], 1);
    let dash = request_ok(&mut stdin, &mut reader, "12", "analytics.dashboard", json!({}));
    assert_eq!(dash["students"], json!([]));

    let again = request(
        &mut stdin,
        &mut reader,
        "13",
        "students.delete",
        json!({ "studentId": sid }),
    );
    assert_eq!(error_code(&again), Some("not_found"));

    drop(stdin);
    let _ = child.wait();
    let _ = std::fs::remove_dir_all(workspace);
}

#[test]
fn create_reports_exhausted_ids_and_keeps_serving() {
    let workspace = temp_dir("attendanced-people-max-id");
    let (mut child, mut stdin, mut reader) = spawn_sidecar();

    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "workspace.select",
        json!({ "path": workspace.to_string_lossy() }),
    );
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "2",
        "storage.importSnapshot",
        json!({ "entries": {
            "students": format!("[{{\"id\":{},\"nama\":\"Last\"}}]", i64::MAX),
            "staff": format!("[{{\"id\":{},\"nama\":\"Last\"}}]", i64::MAX)
        } }),
    );

    let student = request(
        &mut stdin,
        &mut reader,
        "3",
        "students.create",
        json!({ "name": "Overflow" }),
    );
    assert_eq!(error_code(&student), Some("db_update_failed"));
    let staff = request(
        &mut stdin,
        &mut reader,
        "4",
        "people.create",
        json!({ "kind": "staff", "name": "Overflow" }),
    );
    assert_eq!(error_code(&staff), Some("db_update_failed"));

    let list = request_ok(&mut stdin, &mut reader, "5", "students.list", json!({}));
    assert_eq!(list["students"].as_array().map(|a| a.len()), Some(1));
    let _ = request_ok(&mut stdin, &mut reader, "6", "health", json!({}));

    drop(stdin);
    let _ = child.wait();
    let _ = std::fs::remove_dir_all(workspace);
}
