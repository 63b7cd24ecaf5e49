//! Record module - reading and writing JSON documents
//!
//! Includes:
//! - Loading and saving records as pretty JSON
//! - JSON pointer selection of the record inside a larger document
//! - Default output path derivation

use anyhow::{Context, Result, anyhow};
use serde_json::Value;
use std::{
    fs::{self, File},
    io::{BufReader, BufWriter, Write},
    path::{Path, PathBuf},
};

use crate::utils::PathExt;

pub fn load_record(path: &Path) -> Result<Value> {
    let file = File::open(path).with_context(|| format!("failed to open {:?}", path))?;
    serde_json::from_reader(BufReader::new(file))
        .with_context(|| format!("failed to parse JSON from {:?}", path))
}

pub fn save_record(path: &Path, record: &Value) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("failed to create directory {:?}", parent))?;
    }
    let file = File::create(path).with_context(|| format!("failed to create {:?}", path))?;
    let mut writer = BufWriter::new(file);
    serde_json::to_writer_pretty(&mut writer, record)
        .with_context(|| format!("failed to serialize record to {:?}", path))?;
    writer.write_all(b"\n")?;
    writer.flush()?;
    Ok(())
}

/// `data.json` becomes `data_processed.json` next to it
pub fn default_output_path(input: &Path) -> PathBuf {
    let stem = input
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "record".to_string());
    let ext = match input.ext_lower() {
        ext if ext.is_empty() => "json".to_string(),
        ext => ext,
    };
    input.with_file_name(format!("{stem}_processed.{ext}"))
}

/// The value at `pointer`; an empty pointer selects the whole document
pub fn select<'a>(document: &'a Value, pointer: &str) -> Result<&'a Value> {
    document
        .pointer(pointer)
        .ok_or_else(|| anyhow!("no value at JSON pointer {:?}", pointer))
}

/// Put `record` back at `pointer`, replacing what was selected
pub fn graft(document: &mut Value, pointer: &str, record: Value) -> Result<()> {
    let slot = document
        .pointer_mut(pointer)
        .ok_or_else(|| anyhow!("no value at JSON pointer {:?}", pointer))?;
    *slot = record;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn save_then_load_keeps_key_order() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/out.json");
        let record = json!({"z": 1, "a": {"y": "b", "b": [1, 2]}});

        save_record(&path, &record).unwrap();
        let text = fs::read_to_string(&path).unwrap();
        assert!(text.find("\"z\"").unwrap() < text.find("\"a\"").unwrap());
        assert_eq!(load_record(&path).unwrap(), record);
    }

    #[test]
    fn load_reports_the_failing_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.json");
        fs::write(&path, "{not json").unwrap();

        let err = load_record(&path).unwrap_err();
        assert!(format!("{err:#}").contains("broken.json"));
    }

    #[test]
    fn default_output_sits_next_to_input() {
        assert_eq!(
            default_output_path(Path::new("/data/item.JSON")),
            PathBuf::from("/data/item_processed.json")
        );
        assert_eq!(
            default_output_path(Path::new("dump")),
            PathBuf::from("dump_processed.json")
        );
    }

    #[test]
    fn pointer_select_and_graft() {
        let mut document = json!({"info": {"input": {"img": "u"}, "meta": 1}});
        assert_eq!(select(&document, "/info/input").unwrap(), &json!({"img": "u"}));
        assert!(select(&document, "/info/missing").is_err());

        graft(&mut document, "/info/input", json!({"img": "a cat"})).unwrap();
        assert_eq!(document, json!({"info": {"input": {"img": "a cat"}, "meta": 1}}));

        graft(&mut document, "", json!(null)).unwrap();
        assert_eq!(document, json!(null));
    }
}
