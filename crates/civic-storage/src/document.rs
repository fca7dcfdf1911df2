use civic_core::Issue;
use serde::{Deserialize, Serialize, Serializer};
use serde_json::Value;
use std::path::Path;
use tracing::warn;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedRecord {
    pub index: usize,
    pub reason: String,
}

/// One entry of the issues array.
#[derive(Debug, Clone, PartialEq)]
pub enum Record {
    Issue(Issue),
    /// An entry that does not decode as an issue. It is written back exactly
    /// as it was read.
    Unreadable { value: Value, reason: String },
}

impl Serialize for Record {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Record::Issue(issue) => issue.serialize(serializer),
            Record::Unreadable { value, .. } => value.serialize(serializer),
        }
    }
}

/// The issues array in file order, including entries that could not be
/// decoded. Mutations go through this so a save never loses a record it
/// could not read.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct IssueDocument {
    records: Vec<Record>,
}

impl IssueDocument {
    pub fn from_issues(issues: impl IntoIterator<Item = Issue>) -> Self {
        Self {
            records: issues.into_iter().map(Record::Issue).collect(),
        }
    }

    pub(crate) fn decode(path: &Path, raw: Vec<Value>) -> Self {
        let records = raw
            .into_iter()
            .enumerate()
            .map(|(index, value)| match Issue::deserialize(&value) {
                Ok(issue) => Record::Issue(issue),
                Err(err) => {
                    warn!(
                        path = %path.display(),
                        index,
                        error = %err,
                        "keeping unreadable issue record as is"
                    );
                    Record::Unreadable {
                        value,
                        reason: err.to_string(),
                    }
                }
            })
            .collect();
        Self { records }
    }

    pub fn records(&self) -> &[Record] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn issues(&self) -> impl Iterator<Item = &Issue> {
        self.records.iter().filter_map(|record| match record {
            Record::Issue(issue) => Some(issue),
            Record::Unreadable { .. } => None,
        })
    }

    pub fn issues_mut(&mut self) -> impl Iterator<Item = &mut Issue> {
        self.records.iter_mut().filter_map(|record| match record {
            Record::Issue(issue) => Some(issue),
            Record::Unreadable { .. } => None,
        })
    }

    pub fn issue_count(&self) -> usize {
        self.issues().count()
    }

    pub fn find_mut(&mut self, id: &str) -> Option<&mut Issue> {
        self.issues_mut().find(|issue| issue.id == id)
    }

    pub fn push(&mut self, issue: Issue) {
        self.records.push(Record::Issue(issue));
    }

    /// Drops the issues `keep` rejects and returns how many went. Unreadable
    /// records always stay.
    pub fn retain_issues<F>(&mut self, mut keep: F) -> usize
    where
        F: FnMut(&Issue) -> bool,
    {
        let before = self.records.len();
        self.records.retain(|record| match record {
            Record::Issue(issue) => keep(issue),
            Record::Unreadable { .. } => true,
        });
        before - self.records.len()
    }

    /// Positions (in file order) and decode errors of the unreadable records.
    pub fn skipped(&self) -> Vec<SkippedRecord> {
        self.records
            .iter()
            .enumerate()
            .filter_map(|(index, record)| match record {
                Record::Unreadable { reason, .. } => Some(SkippedRecord {
                    index,
                    reason: reason.clone(),
                }),
                Record::Issue(_) => None,
            })
            .collect()
    }

    pub fn into_issues(self) -> Vec<Issue> {
        self.records
            .into_iter()
            .filter_map(|record| match record {
                Record::Issue(issue) => Some(issue),
                Record::Unreadable { .. } => None,
            })
            .collect()
    }
}

impl Serialize for IssueDocument {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_seq(&self.records)
    }
}
