use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use serde_json::Value;
use walkdir::WalkDir;

use crate::core::AutomationItem;

const SHAPE_HINT: &str =
    "expected a JSON array of automation items or an object with an `items` array";

/// Parses a bare item array or an `{ "items": [...] }` document. Item errors
/// name the offending position and id.
pub fn parse_items(s: &str) -> Result<Vec<AutomationItem>> {
    let doc: Value = serde_json::from_str(s).context("snapshot is not valid JSON")?;
    let raw = match doc {
        Value::Array(items) => items,
        Value::Object(mut map) => match map.remove("items") {
            Some(Value::Array(items)) => items,
            _ => bail!("{SHAPE_HINT}"),
        },
        _ => bail!("{SHAPE_HINT}"),
    };

    raw.into_iter()
        .enumerate()
        .map(|(idx, value)| {
            let id = value
                .get("id")
                .and_then(Value::as_str)
                .map(str::to_string);
            serde_json::from_value(value).with_context(|| match id {
                Some(id) => format!("invalid automation item #{idx} (id {id})"),
                None => format!("invalid automation item #{idx}"),
            })
        })
        .collect()
}

fn json_files(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for entry in WalkDir::new(dir).follow_links(false).sort_by_file_name() {
        let entry = entry.with_context(|| format!("failed to walk snapshot directory: {}", dir.display()))?;
        if !entry.file_type().is_file() {
            continue;
        }
        let path = entry.path();
        if path.extension().and_then(|e| e.to_str()) == Some("json") {
            files.push(path.to_path_buf());
        }
    }
    files.sort();
    Ok(files)
}

/// Loads a snapshot from a JSON file or from every `*.json` file under a
/// directory, in sorted path order.
pub fn load(path: &Path) -> Result<Vec<AutomationItem>> {
    let files = if path.is_dir() {
        json_files(path)?
    } else {
        vec![path.to_path_buf()]
    };

    let mut items = Vec::new();
    for file in &files {
        let s = std::fs::read_to_string(file)
            .with_context(|| format!("failed to read snapshot: {}", file.display()))?;
        let parsed =
            parse_items(&s).with_context(|| format!("invalid snapshot: {}", file.display()))?;
        tracing::debug!(file = %file.display(), items = parsed.len(), "loaded snapshot file");
        items.extend(parsed);
    }
    validate(&items)?;
    Ok(items)
}

pub fn validate(items: &[AutomationItem]) -> Result<()> {
    let mut seen = BTreeSet::new();
    for item in items {
        if item.id.trim().is_empty() {
            bail!("automation item {} has an empty id", item.api_name);
        }
        if !seen.insert(item.id.as_str()) {
            bail!("duplicate automation item id: {}", item.id);
        }
    }
    Ok(())
}
