//! Partition Enumerator — expands a configured scope into an ordered
//! sequence of partition descriptors. See §4.4.

use serde::Deserialize;

/// A single `{year, month[, week]}` coordinate scoping one comparison pass.
/// Immutable; compared by exact string equality (§3).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Partition {
    pub year: String,
    pub month: String,
    pub week: Option<String>,
}

impl Partition {
    pub fn new(year: impl Into<String>, month: u32, week: Option<String>) -> Self {
        Partition {
            year: year.into(),
            month: format!("{month:02}"),
            week,
        }
    }

    /// Human-readable coordinate, used in logs and error messages.
    pub fn label(&self) -> String {
        match &self.week {
            Some(w) => format!("{}-{}-w{}", self.year, self.month, w),
            None => format!("{}-{}", self.year, self.month),
        }
    }
}

/// One entry of the configured partitioning scope, as parsed from YAML.
#[derive(Debug, Clone, Deserialize)]
pub struct ScopeEntry {
    pub year: String,
    pub month: u32,
    #[serde(default)]
    pub weeks: Option<Vec<String>>,
}

/// Expand a scope (input order preserved) into partition descriptors. Each
/// `weeks` entry becomes one descriptor per week; otherwise one descriptor
/// with no week.
pub fn enumerate_partitions(scope: &[ScopeEntry]) -> Vec<Partition> {
    let mut out = Vec::new();
    for entry in scope {
        match &entry.weeks {
            Some(weeks) if !weeks.is_empty() => {
                for week in weeks {
                    out.push(Partition::new(&entry.year, entry.month, Some(week.clone())));
                }
            }
            _ => out.push(Partition::new(&entry.year, entry.month, None)),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_month_is_zero_padded() {
        let p = Partition::new("2021", 1, None);
        assert_eq!(p.month, "01");
    }

    #[test]
    fn test_enumerate_without_weeks() {
        let scope = vec![ScopeEntry {
            year: "2021".into(),
            month: 3,
            weeks: None,
        }];
        let partitions = enumerate_partitions(&scope);
        assert_eq!(partitions.len(), 1);
        assert_eq!(partitions[0].label(), "2021-03");
    }

    #[test]
    fn test_enumerate_with_weeks_expands_one_per_week() {
        let scope = vec![ScopeEntry {
            year: "2021".into(),
            month: 1,
            weeks: Some(vec!["1".into(), "2".into(), "3".into()]),
        }];
        let partitions = enumerate_partitions(&scope);
        assert_eq!(partitions.len(), 3);
        assert_eq!(partitions[1].week.as_deref(), Some("2"));
    }

    #[test]
    fn test_enumerate_preserves_input_order() {
        let scope = vec![
            ScopeEntry {
                year: "2021".into(),
                month: 12,
                weeks: None,
            },
            ScopeEntry {
                year: "2021".into(),
                month: 1,
                weeks: None,
            },
        ];
        let partitions = enumerate_partitions(&scope);
        assert_eq!(partitions[0].month, "12");
        assert_eq!(partitions[1].month, "01");
    }

    #[test]
    fn test_empty_weeks_list_falls_back_to_single_descriptor() {
        let scope = vec![ScopeEntry {
            year: "2021".into(),
            month: 6,
            weeks: Some(vec![]),
        }];
        let partitions = enumerate_partitions(&scope);
        assert_eq!(partitions.len(), 1);
        assert!(partitions[0].week.is_none());
    }
}
