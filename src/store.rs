//! File-backed document store: news items as a JSON array or as JSON lines.

use std::path::Path;

use anyhow::{Context, Result};
use chrono::Duration;
use tracing::{debug, info};

use crate::narr::model::NewsItem;

/// Load news items from `path`. A file whose first non-blank character is
/// `[` is read as a JSON array, anything else as one item per line.
pub fn load_items<P: AsRef<Path>>(path: P) -> Result<Vec<NewsItem>> {
    let path = path.as_ref();
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("Unable to read news items from {}", path.display()))?;
    let items = parse_items(&raw).with_context(|| format!("Invalid news items in {}", path.display()))?;
    info!(path = %path.display(), items = items.len(), "news items loaded");
    Ok(items)
}

pub fn parse_items(raw: &str) -> Result<Vec<NewsItem>> {
    if raw.trim_start().starts_with('[') {
        return Ok(serde_json::from_str(raw)?);
    }
    raw.lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .map(|(idx, line)| {
            serde_json::from_str(line).with_context(|| format!("line {}", idx + 1))
        })
        .collect()
}

/// Keep items published within `hours` of the newest dated item, in their
/// original order. Undated items are always kept.
pub fn within_window(items: Vec<NewsItem>, hours: u32) -> Vec<NewsItem> {
    let Some(newest) = items.iter().filter_map(|i| i.published_at).max() else {
        return items;
    };
    let cutoff = newest - Duration::hours(i64::from(hours));
    let before = items.len();
    let kept = items
        .into_iter()
        .filter(|i| i.published_at.is_none_or(|at| at >= cutoff))
        .collect::<Vec<NewsItem>>();
    debug!(before, after = kept.len(), hours, "time window applied");
    kept
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use chrono::{TimeZone, Utc};

    use super::*;
    use crate::narr::model::UNKNOWN_SOURCE;

    #[test]
    fn test_parse_array_and_lines() {
        let array = r#"[
            {"title": "First", "link": "https://a.example/1", "source_name": "Wire"},
            {"title": "Second", "description": "Body"}
        ]"#;
        let items = parse_items(array).unwrap();
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].source(), "Wire");
        assert_eq!(items[1].source(), UNKNOWN_SOURCE);
        assert_eq!(items[1].description, "Body");

        let lines = "{\"title\": \"First\"}\n\n{\"title\": \"Second\", \"id\": 7}\n";
        let items = parse_items(lines).unwrap();
        assert_eq!(items.len(), 2);
        assert_eq!(items[1].id, Some(7));

        let err = parse_items("{\"title\": \"ok\"}\nnot json").unwrap_err();
        assert!(format!("{:#}", err).contains("line 2"));
    }

    #[test]
    fn test_load_items_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "{{\"title\": \"One\", \"link\": \"l1\"}}").unwrap();
        writeln!(file, "{{\"title\": \"Two\", \"link\": \"l2\"}}").unwrap();
        let items = load_items(file.path()).unwrap();
        assert_eq!(
            items.iter().map(|i| i.title.as_str()).collect::<Vec<_>>(),
            vec!["One", "Two"]
        );
        assert!(load_items(file.path().with_extension("missing")).is_err());
    }

    #[test]
    fn test_within_window() {
        let at = |hour| Some(Utc.with_ymd_and_hms(2024, 3, 9, hour, 0, 0).unwrap());
        let items = vec![
            NewsItem {
                published_at: at(1),
                ..NewsItem::new("old")
            },
            NewsItem::new("undated"),
            NewsItem {
                published_at: at(20),
                ..NewsItem::new("recent")
            },
            NewsItem {
                published_at: at(22),
                ..NewsItem::new("newest")
            },
        ];
        let kept = within_window(items, 6);
        assert_eq!(
            kept.iter().map(|i| i.title.as_str()).collect::<Vec<_>>(),
            vec!["undated", "recent", "newest"]
        );
    }
}
