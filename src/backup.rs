//! Backup bundles hold the dashboard's storage keys, one zip entry per key, plus a manifest
//! with a checksum over the key set. A plain JSON object of string values, as saved from the
//! browser's local storage, is accepted on import too.

use anyhow::{anyhow, Context};
use serde_json::{json, Value};
use sha2::{Digest, Sha256};
use std::fs::File;
use std::io::{Read, Write};
use std::path::Path;
use zip::write::FileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

const MANIFEST_ENTRY: &str = "manifest.json";
const KEY_DIR: &str = "storage/";
pub const BUNDLE_FORMAT_V1: &str = "attendance-storage-v1";
pub const LOCAL_STORAGE_FORMAT: &str = "local-storage-json";

#[derive(Debug, Clone)]
pub struct ExportSummary {
    pub bundle_format: String,
    pub bundle_id: String,
    pub sha256: String,
    pub keys: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct Bundle {
    pub format_detected: String,
    pub bundle_id: Option<String>,
    /// Sorted by key.
    pub entries: Vec<(String, String)>,
}

/// Digest over `key NUL value NUL` for each entry in key order.
pub fn entries_sha256(entries: &[(String, String)]) -> String {
    let mut sorted: Vec<&(String, String)> = entries.iter().collect();
    sorted.sort_by(|a, b| a.0.cmp(&b.0));
    let mut hasher = Sha256::new();
    for (key, value) in sorted {
        hasher.update(key.as_bytes());
        hasher.update([0u8]);
        hasher.update(value.as_bytes());
        hasher.update([0u8]);
    }
    format!("{:x}", hasher.finalize())
}

fn entry_name(key: &str) -> String {
    format!("{KEY_DIR}{key}.json")
}

pub fn write_bundle(
    out_path: &Path,
    entries: &[(String, String)],
) -> anyhow::Result<ExportSummary> {
    let mut entries = entries.to_vec();
    entries.sort_by(|a, b| a.0.cmp(&b.0));
    let sha256 = entries_sha256(&entries);
    let bundle_id = uuid::Uuid::new_v4().to_string();
    let keys: Vec<String> = entries.iter().map(|(k, _)| k.clone()).collect();

    if let Some(parent) = out_path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create directory {}", parent.to_string_lossy()))?;
    }
    let out_file = File::create(out_path)
        .with_context(|| format!("failed to create output file {}", out_path.to_string_lossy()))?;
    let mut zip = ZipWriter::new(out_file);
    let opts = FileOptions::default().compression_method(CompressionMethod::Deflated);

    let manifest = json!({
        "format": BUNDLE_FORMAT_V1,
        "appVersion": env!("CARGO_PKG_VERSION"),
        "exportedAt": chrono::Utc::now().to_rfc3339(),
        "bundleId": bundle_id,
        "keys": keys,
        "sha256": sha256,
    });
    zip.start_file(MANIFEST_ENTRY, opts)
        .context("failed to start manifest entry")?;
    zip.write_all(
        serde_json::to_string_pretty(&manifest)
            .context("failed to serialize manifest")?
            .as_bytes(),
    )
    .context("failed to write manifest entry")?;

    for (key, value) in &entries {
        zip.start_file(entry_name(key), opts)
            .with_context(|| format!("failed to start entry for {key}"))?;
        zip.write_all(value.as_bytes())
            .with_context(|| format!("failed to write entry for {key}"))?;
    }
    zip.finish().context("failed to finalize zip bundle")?;

    Ok(ExportSummary {
        bundle_format: BUNDLE_FORMAT_V1.to_string(),
        bundle_id,
        sha256,
        keys,
    })
}

pub fn read_bundle(in_path: &Path) -> anyhow::Result<Bundle> {
    if !is_zip_file(in_path)? {
        return read_local_storage_dump(in_path);
    }

    let in_file = File::open(in_path)
        .with_context(|| format!("failed to open bundle {}", in_path.to_string_lossy()))?;
    let mut archive = ZipArchive::new(in_file).context("invalid zip archive")?;

    let mut manifest_text = String::new();
    archive
        .by_name(MANIFEST_ENTRY)
        .context("bundle missing manifest.json")?
        .read_to_string(&mut manifest_text)
        .context("failed to read manifest.json")?;
    let manifest: Value =
        serde_json::from_str(&manifest_text).context("manifest.json is invalid JSON")?;
    let format = manifest.get("format").and_then(|v| v.as_str()).unwrap_or("");
    if format != BUNDLE_FORMAT_V1 {
        return Err(anyhow!("unsupported bundle format: {}", format));
    }
    let Some(keys) = manifest.get("keys").and_then(|v| v.as_array()) else {
        return Err(anyhow!("manifest.json has no key list"));
    };

    let mut entries = Vec::with_capacity(keys.len());
    for key in keys {
        let Some(key) = key.as_str() else {
            return Err(anyhow!("manifest.json key list holds a non-string"));
        };
        let mut value = String::new();
        archive
            .by_name(&entry_name(key))
            .with_context(|| format!("bundle missing entry for {key}"))?
            .read_to_string(&mut value)
            .with_context(|| format!("failed to read entry for {key}"))?;
        entries.push((key.to_string(), value));
    }
    entries.sort_by(|a, b| a.0.cmp(&b.0));

    if let Some(expected) = manifest.get("sha256").and_then(|v| v.as_str()) {
        let actual = entries_sha256(&entries);
        if !actual.eq_ignore_ascii_case(expected) {
            return Err(anyhow!(
                "bundle checksum mismatch: manifest {}, entries {}",
                expected,
                actual
            ));
        }
    }

    Ok(Bundle {
        format_detected: BUNDLE_FORMAT_V1.to_string(),
        bundle_id: manifest
            .get("bundleId")
            .and_then(|v| v.as_str())
            .map(str::to_string),
        entries,
    })
}

fn read_local_storage_dump(in_path: &Path) -> anyhow::Result<Bundle> {
    let text = std::fs::read_to_string(in_path)
        .with_context(|| format!("failed to read {}", in_path.to_string_lossy()))?;
    let dump: Value = serde_json::from_str(&text)
        .context("input is neither a zip bundle nor a JSON local-storage dump")?;
    let Some(object) = dump.as_object() else {
        return Err(anyhow!("local-storage dump must be a JSON object"));
    };
    let mut entries = Vec::with_capacity(object.len());
    for (key, value) in object {
        let Some(value) = value.as_str() else {
            return Err(anyhow!("local-storage value for {key} is not a string"));
        };
        entries.push((key.clone(), value.to_string()));
    }
    entries.sort_by(|a, b| a.0.cmp(&b.0));
    Ok(Bundle {
        format_detected: LOCAL_STORAGE_FORMAT.to_string(),
        bundle_id: None,
        entries,
    })
}

fn is_zip_file(path: &Path) -> anyhow::Result<bool> {
    let mut f = File::open(path)
        .with_context(|| format!("failed to open input file {}", path.to_string_lossy()))?;
    let mut sig = [0u8; 4];
    let read = f.read(&mut sig).context("failed to read file signature")?;
    if read < 4 {
        return Ok(false);
    }
    Ok(sig == [0x50, 0x4B, 0x03, 0x04])
}
