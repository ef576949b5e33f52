//! Bootstrapping mappings for trackers that were already mirrored by hand
//!
//! `detect_mappings` pairs source issues with destination issues that carry
//! the same title; the pairs can be reviewed as CSV and then imported into
//! the mapping store.

use crate::integrations::{DestinationTracker, SourceTracker};
use crate::state::MappingStore;
use crate::{Result, SyncError};
use chrono::{DateTime, Duration, Utc};
use std::collections::HashSet;
use std::io::{BufRead, Write};
use tracing::{info, warn};

/// How far back detection looks (effectively "all issues")
pub const DETECT_LOOKBACK_DAYS: i64 = 30 * 365;

/// A source issue id paired with its destination key
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MappingPair {
    pub source_id: String,
    pub dest_key: String,
}

impl MappingPair {
    pub fn new(source_id: impl Into<String>, dest_key: impl Into<String>) -> Self {
        Self {
            source_id: source_id.into(),
            dest_key: dest_key.into(),
        }
    }
}

/// Default lower bound for detection
pub fn detect_since() -> DateTime<Utc> {
    Utc::now() - Duration::days(DETECT_LOOKBACK_DAYS)
}

/// Pair every source issue changed since `since` with a destination issue
/// of the same title.
///
/// Lookup failures for single issues are logged and skipped.
pub async fn detect_mappings<S, D>(
    source: &S,
    dest: &D,
    since: DateTime<Utc>,
) -> Result<Vec<MappingPair>>
where
    S: SourceTracker + ?Sized,
    D: DestinationTracker + ?Sized,
{
    let issues = source.list_changed_issues(since).await?;
    info!(count = issues.len(), tracker = source.name(), "Found source issues");

    let mut seen = HashSet::new();
    let mut pairs = Vec::new();

    for issue in &issues {
        let source_id = issue.key_str();
        match dest.find_issue_by_title(&issue.title.value).await {
            Ok(Some(dest_key)) => {
                if !seen.insert(source_id.to_string()) {
                    warn!(source_id = %source_id, dest_key = %dest_key, "Duplicate source issue, skipping");
                    continue;
                }
                info!(source_id = %source_id, dest_key = %dest_key, "Detected mapping");
                pairs.push(MappingPair::new(source_id, dest_key));
            }
            Ok(None) => {
                info!(source_id = %source_id, title = %issue.title.value, "No destination issue found");
            }
            Err(e) => {
                warn!(source_id = %source_id, error = %e, "Title lookup failed, skipping");
            }
        }
    }

    Ok(pairs)
}

/// Write one `"<source id>, <dest key>"` line per pair
pub fn write_mappings_csv<W: Write>(pairs: &[MappingPair], mut writer: W) -> Result<()> {
    for pair in pairs {
        writeln!(writer, "{}, {}", pair.source_id, pair.dest_key)?;
    }
    writer.flush()?;
    Ok(())
}

/// Parse mapping lines; blank lines and `#` comments are skipped and columns
/// after the second are ignored
pub fn read_mappings_csv<R: BufRead>(reader: R) -> Result<Vec<MappingPair>> {
    let mut pairs = Vec::new();

    for (index, line) in reader.lines().enumerate() {
        let line = line?;
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }

        let mut columns = trimmed.split(',').map(str::trim);
        match (columns.next(), columns.next()) {
            (Some(source_id), Some(dest_key)) if !source_id.is_empty() && !dest_key.is_empty() => {
                pairs.push(MappingPair::new(source_id, dest_key));
            }
            _ => {
                return Err(SyncError::Parse(format!(
                    "Line {}: expected '<source id>, <dest key>', got '{}'",
                    index + 1,
                    trimmed
                )));
            }
        }
    }

    Ok(pairs)
}

/// Record every pair in the store, returning how many were imported
pub fn import_mappings(store: &mut dyn MappingStore, pairs: &[MappingPair]) -> Result<usize> {
    for pair in pairs {
        store.put(&pair.source_id, &pair.dest_key)?;
    }
    info!(count = pairs.len(), total = store.len(), "Imported mappings");
    Ok(pairs.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::InMemoryStore;
    use std::io::Cursor;

    #[test]
    fn test_write_format() {
        let pairs = vec![MappingPair::new("1", "VDK-10"), MappingPair::new("2", "VDK-11")];
        let mut out = Vec::new();

        write_mappings_csv(&pairs, &mut out).unwrap();

        assert_eq!(String::from_utf8(out).unwrap(), "1, VDK-10\n2, VDK-11\n");
    }

    #[test]
    fn test_read_skips_comments_and_extra_columns() {
        let input = "# source, dest\n\n1, VDK-10, Crash on start, Crash on start \n  2,VDK-11\n";

        let pairs = read_mappings_csv(Cursor::new(input)).unwrap();

        assert_eq!(
            pairs,
            vec![MappingPair::new("1", "VDK-10"), MappingPair::new("2", "VDK-11")]
        );
    }

    #[test]
    fn test_read_reports_line_number() {
        let input = "1, VDK-10\nnot-a-pair\n";

        let err = read_mappings_csv(Cursor::new(input)).unwrap_err();

        assert!(matches!(err, SyncError::Parse(ref msg) if msg.starts_with("Line 2")));
    }

    #[test]
    fn test_import_into_store() {
        let mut store = InMemoryStore::new();
        let pairs = vec![MappingPair::new("1", "VDK-10"), MappingPair::new("2", "VDK-11")];

        let count = import_mappings(&mut store, &pairs).unwrap();

        assert_eq!(count, 2);
        assert_eq!(store.get_dest("2").as_deref(), Some("VDK-11"));
        assert_eq!(store.get_source("VDK-10").as_deref(), Some("1"));
    }
}
