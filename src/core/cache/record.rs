// ─── Entry Record ───
// The persisted `entry.json` of a file cache entry.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::core::error::{JnlpError, JnlpResult};
use crate::core::reference::ReferenceKind;

pub const RECORD_FILE_NAME: &str = "entry.json";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EntryRecord {
    pub vendor: String,
    pub title: String,
    #[serde(default)]
    pub meta: BTreeMap<String, String>,
    #[serde(default)]
    pub resources: Vec<ResourceRecord>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceRecord {
    pub href: String,
    pub kind: ReferenceKind,
    /// Remote modification time in epoch milliseconds.
    #[serde(default)]
    pub modtime: i64,
    #[serde(default, skip_serializing_if = "is_false")]
    pub lazy: bool,
}

fn is_false(value: &bool) -> bool {
    !*value
}

impl EntryRecord {
    pub fn new(vendor: &str, title: &str) -> Self {
        Self {
            vendor: vendor.to_string(),
            title: title.to_string(),
            ..Default::default()
        }
    }

    pub fn load(path: &Path) -> JnlpResult<Self> {
        let json = fs::read_to_string(path).map_err(|e| JnlpError::io(path, e))?;
        let record: EntryRecord = serde_json::from_str(&json)?;
        Ok(record)
    }

    /// Rewrite the whole record. The JSON goes to a uniquely named sibling
    /// first and is renamed over the target, so readers never see a torn file.
    pub fn save(&self, path: &Path) -> JnlpResult<()> {
        let json = serde_json::to_string_pretty(self)?;

        let parent = path.parent().unwrap_or_else(|| Path::new("."));
        fs::create_dir_all(parent).map_err(|e| JnlpError::io(parent, e))?;

        let tmp = parent.join(format!(".{}.{}.tmp", RECORD_FILE_NAME, uuid::Uuid::new_v4()));
        fs::write(&tmp, json).map_err(|e| JnlpError::io(&tmp, e))?;

        if let Err(e) = fs::rename(&tmp, path) {
            let _ = fs::remove_file(&tmp);
            return Err(JnlpError::io(path, e));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn save_and_load_preserve_fields() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("Acme").join("Demo").join(RECORD_FILE_NAME);

        let mut record = EntryRecord::new("Acme", "Demo");
        record
            .meta
            .insert("descriptor".into(), "http://x/demo.jnlp".into());
        record.resources.push(ResourceRecord {
            href: "http://x/native.jar".into(),
            kind: ReferenceKind::NativeLibrary,
            modtime: 42,
            lazy: true,
        });

        record.save(&path).unwrap();
        assert_eq!(EntryRecord::load(&path).unwrap(), record);

        // no temporary files left behind
        let names: Vec<_> = fs::read_dir(path.parent().unwrap())
            .unwrap()
            .map(|e| e.unwrap().file_name())
            .collect();
        assert_eq!(names.len(), 1);
    }

    #[test]
    fn kinds_use_record_vocabulary() {
        let json = r#"{
            "vendor": "Acme",
            "title": "Demo",
            "resources": [
                { "href": "http://x/demo.jar", "kind": "resource", "modtime": 1 },
                { "href": "http://x/lib.jar", "kind": "native-library" }
            ]
        }"#;
        let record: EntryRecord = serde_json::from_str(json).unwrap();

        assert!(record.meta.is_empty());
        assert_eq!(record.resources[0].kind, ReferenceKind::Jar);
        assert_eq!(record.resources[1].kind, ReferenceKind::NativeLibrary);
        assert_eq!(record.resources[1].modtime, 0);
        assert!(!record.resources[0].lazy);

        let out = serde_json::to_string(&record).unwrap();
        assert!(out.contains(r#""kind":"resource""#));
        assert!(!out.contains("lazy"));
    }
}
