//! Merge-Walker — the co-iteration state machine over two primary-key
//! ordered row streams. See §4.6.

use crate::error::{Result, SyncError};
use crate::row::Row;
use crate::value::compare_keys;

/// One event emitted by the walker for a given primary-key position.
#[derive(Debug, Clone, PartialEq)]
pub enum MergeEvent {
    Match(Row, Row),
    MissingInDest(Row),
    ExtraInDest(Row),
}

/// Co-walk two key-ordered row slices, emitting events per §4.6.
///
/// `source`/`dest` must already be in non-decreasing primary-key order;
/// violating that is a reader bug, not a data condition, and is reported
/// via [`SyncError::Ordering`]. A primary-key type mismatch between the two
/// sides at a compared position is [`SyncError::TypeMismatchOnKey`].
pub fn merge(
    source: &[Row],
    dest: &[Row],
    primary_key: &str,
    partition_label: &str,
) -> Result<Vec<MergeEvent>> {
    let mut events = Vec::new();
    let mut i = 0;
    let mut j = 0;
    let mut last_source_key = None;
    let mut last_dest_key = None;

    while i < source.len() || j < dest.len() {
        if i >= source.len() {
            events.push(MergeEvent::ExtraInDest(dest[j].clone()));
            j += 1;
            continue;
        }
        if j >= dest.len() {
            events.push(MergeEvent::MissingInDest(source[i].clone()));
            i += 1;
            continue;
        }

        let s_key = source[i].get_or_null(primary_key);
        let d_key = dest[j].get_or_null(primary_key);

        if let Some(prev) = last_source_key.take() {
            if compare_keys(&prev, s_key) == Some(std::cmp::Ordering::Greater) {
                return Err(SyncError::Ordering {
                    partition: partition_label.to_string(),
                    previous: format!("{prev}"),
                    next: format!("{s_key}"),
                });
            }
        }
        last_source_key = Some(s_key.clone());

        if let Some(prev) = last_dest_key.take() {
            if compare_keys(&prev, d_key) == Some(std::cmp::Ordering::Greater) {
                return Err(SyncError::Ordering {
                    partition: partition_label.to_string(),
                    previous: format!("{prev}"),
                    next: format!("{d_key}"),
                });
            }
        }
        last_dest_key = Some(d_key.clone());

        match compare_keys(s_key, d_key) {
            Some(std::cmp::Ordering::Equal) => {
                events.push(MergeEvent::Match(source[i].clone(), dest[j].clone()));
                i += 1;
                j += 1;
            }
            Some(std::cmp::Ordering::Less) => {
                events.push(MergeEvent::MissingInDest(source[i].clone()));
                i += 1;
            }
            Some(std::cmp::Ordering::Greater) => {
                events.push(MergeEvent::ExtraInDest(dest[j].clone()));
                j += 1;
            }
            None => {
                return Err(SyncError::TypeMismatchOnKey {
                    partition: partition_label.to_string(),
                    source_repr: format!("{s_key}"),
                    dest_repr: format!("{d_key}"),
                });
            }
        }
    }

    Ok(events)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::Value;
    use std::collections::BTreeMap;

    fn row(id: i64) -> Row {
        let mut m = BTreeMap::new();
        m.insert("id".to_string(), Value::Int(id));
        Row::new(m)
    }

    #[test]
    fn test_identical_streams_emit_only_matches() {
        let source = vec![row(1), row(2), row(3)];
        let dest = source.clone();
        let events = merge(&source, &dest, "id", "2021-01").unwrap();
        assert_eq!(events.len(), 3);
        assert!(events.iter().all(|e| matches!(e, MergeEvent::Match(_, _))));
    }

    #[test]
    fn test_scenario_c_extra_and_missing() {
        let source = vec![row(1), row(2), row(3)];
        let dest = vec![row(2), row(3), row(4)];
        let events = merge(&source, &dest, "id", "2021-01").unwrap();
        assert_eq!(events.len(), 4);
        assert!(matches!(&events[0], MergeEvent::MissingInDest(r) if r.get("id") == Some(&Value::Int(1))));
        assert!(matches!(&events[1], MergeEvent::Match(_, _)));
        assert!(matches!(&events[2], MergeEvent::Match(_, _)));
        assert!(matches!(&events[3], MergeEvent::ExtraInDest(r) if r.get("id") == Some(&Value::Int(4))));
    }

    #[test]
    fn test_empty_source_all_extra() {
        let source: Vec<Row> = vec![];
        let dest = vec![row(1), row(2)];
        let events = merge(&source, &dest, "id", "2021-01").unwrap();
        assert_eq!(events.len(), 2);
        assert!(events.iter().all(|e| matches!(e, MergeEvent::ExtraInDest(_))));
    }

    #[test]
    fn test_empty_dest_all_missing() {
        let source = vec![row(1), row(2)];
        let dest: Vec<Row> = vec![];
        let events = merge(&source, &dest, "id", "2021-01").unwrap();
        assert_eq!(events.len(), 2);
        assert!(events.iter().all(|e| matches!(e, MergeEvent::MissingInDest(_))));
    }

    #[test]
    fn test_non_monotonic_source_is_ordering_error() {
        let source = vec![row(2), row(1)];
        let dest = vec![row(1), row(2)];
        let err = merge(&source, &dest, "id", "2021-01").unwrap_err();
        assert!(matches!(err, SyncError::Ordering { .. }));
    }

    #[test]
    fn test_type_mismatch_on_key() {
        let mut str_row = BTreeMap::new();
        str_row.insert("id".to_string(), Value::String("1".to_string()));
        let source = vec![row(1)];
        let dest = vec![Row::new(str_row)];
        let err = merge(&source, &dest, "id", "2021-01").unwrap_err();
        assert!(matches!(err, SyncError::TypeMismatchOnKey { .. }));
    }
}
