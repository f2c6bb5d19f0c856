//! Catalog loading from a JSON array of `{title, artists, url, event?}`

use std::path::Path;

use anyhow::Context;
use serde_json::Value;

use crate::state::Item;

const REQUIRED_FIELDS: [&str; 3] = ["title", "artists", "url"];

/// Load the catalog file. See [`parse_catalog`].
pub fn load_catalog(path: &Path) -> anyhow::Result<Vec<Item>> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Cannot read catalog {}", path.display()))?;
    parse_catalog(&content).with_context(|| format!("Invalid catalog {}", path.display()))
}

/// Parse a catalog document.
///
/// The top level must be an array. Entries with missing or null required
/// fields are kept (with a warning per entry) so they fail per item later;
/// non-object entries are dropped.
pub fn parse_catalog(json: &str) -> anyhow::Result<Vec<Item>> {
    let value: Value = serde_json::from_str(json).context("Invalid JSON")?;
    let Value::Array(entries) = value else {
        anyhow::bail!("catalog must contain a JSON array");
    };

    let mut items = Vec::with_capacity(entries.len());
    for (idx, entry) in entries.into_iter().enumerate() {
        let Some(obj) = entry.as_object() else {
            log::warn!("Item {idx} is not an object, skipping");
            continue;
        };
        let missing: Vec<&str> = REQUIRED_FIELDS
            .iter()
            .copied()
            .filter(|f| obj.get(*f).map_or(true, Value::is_null))
            .collect();
        if !missing.is_empty() {
            log::warn!("Item {idx} missing fields: {}", missing.join(", "));
        }
        match serde_json::from_value::<Item>(entry) {
            Ok(item) => items.push(item),
            Err(e) => log::warn!("Item {idx} has malformed fields ({e}), skipping"),
        }
    }
    Ok(items)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_full_entries() {
        let items = parse_catalog(
            r#"[
                {"title": "A", "artists": "X", "url": "http://site/a", "event": "Praise Night 25"},
                {"title": "B", "artists": "Y", "url": "http://site/b"}
            ]"#,
        )
        .unwrap();
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].event.as_deref(), Some("Praise Night 25"));
        assert_eq!(items[1], Item::new("B", "Y", "http://site/b"));
    }

    #[test]
    fn keeps_entries_with_missing_fields() {
        let items = parse_catalog(r#"[{"title": "A"}, {"url": "http://site/b"}]"#).unwrap();
        assert_eq!(items.len(), 2);
        assert!(!items[0].has_url());
        assert_eq!(items[1].title, "Unknown Title");
    }

    #[test]
    fn keeps_entries_with_null_fields() {
        let items = parse_catalog(
            r#"[
                {"title": "A", "artists": "X", "url": null},
                {"title": null, "artists": "Y", "url": "http://site/b"}
            ]"#,
        )
        .unwrap();
        assert_eq!(items.len(), 2);
        assert!(!items[0].has_url());
        assert_eq!(items[0].title, "A");
        assert_eq!(items[1].title, "Unknown Title");
        assert!(items[1].has_url());
    }

    #[test]
    fn drops_non_objects() {
        let items = parse_catalog(r#"[1, "x", {"title": "A", "artists": "X", "url": "u"}]"#).unwrap();
        assert_eq!(items.len(), 1);
    }

    #[test]
    fn rejects_non_array() {
        assert!(parse_catalog(r#"{"title": "A"}"#).is_err());
        assert!(parse_catalog("not json").is_err());
    }

    #[test]
    fn load_missing_file_fails() {
        let dir = tempfile::tempdir().unwrap();
        assert!(load_catalog(&dir.path().join("links.json")).is_err());
    }
}
