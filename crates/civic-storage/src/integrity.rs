use civic_core::{parse_timestamp, Issue};
use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeSet;

const REQUIRED_FIELDS: [&str; 5] = ["id", "title", "description", "timestamp", "status"];

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MissingFields {
    pub index: usize,
    pub missing: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RecordError {
    pub index: usize,
    pub error: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct IntegrityReport {
    pub total_issues: usize,
    pub valid_issues: usize,
    pub invalid_issues: usize,
    pub missing_fields: Vec<MissingFields>,
    pub duplicate_ids: Vec<String>,
    pub errors: Vec<RecordError>,
}

impl IntegrityReport {
    pub fn is_clean(&self) -> bool {
        self.invalid_issues == 0 && self.missing_fields.is_empty() && self.duplicate_ids.is_empty()
    }

    pub(crate) fn from_records(records: &[Value]) -> Self {
        let mut report = IntegrityReport {
            total_issues: records.len(),
            ..IntegrityReport::default()
        };
        let mut seen_ids = BTreeSet::new();

        for (index, record) in records.iter().enumerate() {
            let missing = REQUIRED_FIELDS
                .iter()
                .filter(|field| is_blank(record.get(**field)))
                .map(|field| field.to_string())
                .collect::<Vec<_>>();
            if !missing.is_empty() {
                report.missing_fields.push(MissingFields { index, missing });
            }

            if let Some(id) = record.get("id").and_then(Value::as_str) {
                if !id.is_empty() && !seen_ids.insert(id.to_string()) {
                    report.duplicate_ids.push(id.to_string());
                }
            }

            match check_record(record) {
                Ok(()) => report.valid_issues += 1,
                Err(error) => {
                    report.invalid_issues += 1;
                    report.errors.push(RecordError { index, error });
                }
            }
        }

        report
    }
}

fn check_record(record: &Value) -> Result<(), String> {
    let issue: Issue = serde_json::from_value(record.clone()).map_err(|err| err.to_string())?;
    if !issue.timestamp.is_empty() && parse_timestamp(&issue.timestamp).is_none() {
        return Err(format!("invalid timestamp: {}", issue.timestamp));
    }
    Ok(())
}

fn is_blank(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => true,
        Some(Value::String(text)) => text.is_empty(),
        Some(Value::Bool(flag)) => !flag,
        Some(Value::Array(items)) => items.is_empty(),
        Some(Value::Object(map)) => map.is_empty(),
        Some(Value::Number(_)) => false,
    }
}
