use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::{JobId, JobSpec};

/// Predicate picking the jobs a lifecycle operation applies to.
///
/// A selector is evaluated once, when the operation is called; jobs queued
/// afterwards are not affected even if they would match.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum JobSelector {
    /// Every job currently queued.
    All,
    /// Jobs with one of the given ids.
    Ids(BTreeSet<JobId>),
    /// Jobs with exactly this name.
    Name(String),
    /// Jobs whose metadata holds `key = value`.
    Metadata { key: String, value: String },
}

impl JobSelector {
    pub fn id(id: JobId) -> Self {
        JobSelector::Ids(BTreeSet::from([id]))
    }

    pub fn ids(ids: impl IntoIterator<Item = JobId>) -> Self {
        JobSelector::Ids(ids.into_iter().collect())
    }

    pub fn metadata(key: impl Into<String>, value: impl Into<String>) -> Self {
        JobSelector::Metadata {
            key: key.into(),
            value: value.into(),
        }
    }

    pub fn matches(&self, job: &JobSpec) -> bool {
        match self {
            JobSelector::All => true,
            JobSelector::Ids(ids) => ids.contains(&job.id),
            JobSelector::Name(name) => job.name == *name,
            JobSelector::Metadata { key, value } => {
                job.metadata.get(key).is_some_and(|v| v == value)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Task;

    fn job(name: &str) -> JobSpec {
        JobSpec::new(name, vec![Task::new(b"t".to_vec())]).with_metadata("team", "render")
    }

    #[test]
    fn all_matches_everything() {
        assert!(JobSelector::All.matches(&job("a")));
    }

    #[test]
    fn ids_match_only_listed_jobs() {
        let a = job("a");
        let b = job("b");
        let sel = JobSelector::id(a.id);
        assert!(sel.matches(&a));
        assert!(!sel.matches(&b));
    }

    #[test]
    fn name_and_metadata() {
        let a = job("a");
        assert!(JobSelector::Name("a".into()).matches(&a));
        assert!(!JobSelector::Name("b".into()).matches(&a));
        assert!(JobSelector::metadata("team", "render").matches(&a));
        assert!(!JobSelector::metadata("team", "audio").matches(&a));
        assert!(!JobSelector::metadata("owner", "render").matches(&a));
    }
}
