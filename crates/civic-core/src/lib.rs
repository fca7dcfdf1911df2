use chrono::{DateTime, Local, NaiveDateTime, SecondsFormat, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

pub mod accounts;
pub mod directory;
pub mod query;
pub mod stats;

pub use accounts::{ensure_permission, AuthError, Role, Session};
pub use query::{ExportRow, IssueFilter, IssueSort};
pub use stats::{reporter_summaries, IssueStatistics, ReporterSummary};

pub const REASSIGNMENT_REASON: &str = "Admin reassignment";

/// One citizen-submitted civic complaint. Field names are the JSON keys of
/// the issues document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Issue {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub location: String,
    #[serde(default)]
    pub latitude: Option<f64>,
    #[serde(default)]
    pub longitude: Option<f64>,
    #[serde(default)]
    pub reporter_name: String,
    #[serde(default)]
    pub phone: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub preferred_contact: String,
    #[serde(default)]
    pub priority: IssuePriority,
    #[serde(default)]
    pub status: IssueStatus,
    #[serde(default)]
    pub department: Department,
    #[serde(default)]
    pub routing_method: RoutingMethod,
    #[serde(default)]
    pub ai_confidence: f64,
    pub timestamp: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_updated: Option<String>,
    #[serde(default)]
    pub image_data: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub admin_notes: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub reassignment_history: Vec<ReassignmentEntry>,
    #[serde(default, flatten)]
    pub extra: BTreeMap<String, Value>,
}

impl Issue {
    /// Lowercased `title + " " + description`, the text every keyword scan
    /// runs against.
    pub fn scan_text(&self) -> String {
        scan_text(&self.title, &self.description)
    }

    pub fn created_at(&self) -> Option<DateTime<Utc>> {
        parse_timestamp(&self.timestamp)
    }

    pub fn touch(&mut self) {
        self.last_updated = Some(now_timestamp());
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReassignmentEntry {
    pub from: Department,
    pub to: Department,
    pub timestamp: String,
    pub reason: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Department {
    Sanitation,
    #[serde(rename = "Public Works")]
    PublicWorks,
    #[serde(rename = "Traffic Police")]
    TrafficPolice,
    #[serde(rename = "Water Department")]
    WaterDepartment,
    #[serde(rename = "Electricity Board")]
    ElectricityBoard,
    #[serde(rename = "Parks & Recreation")]
    ParksRecreation,
    #[serde(alias = "Other", alias = "Other/General")]
    General,
}

impl Default for Department {
    fn default() -> Self {
        Self::General
    }
}

impl Department {
    pub const ALL: [Department; 7] = [
        Department::Sanitation,
        Department::PublicWorks,
        Department::TrafficPolice,
        Department::WaterDepartment,
        Department::ElectricityBoard,
        Department::ParksRecreation,
        Department::General,
    ];

    /// Departments an issue can be routed to automatically, in enumeration
    /// order. `General` is only ever assigned by hand or by the submission
    /// fallback.
    pub const ROUTABLE: [Department; 6] = [
        Department::Sanitation,
        Department::PublicWorks,
        Department::TrafficPolice,
        Department::WaterDepartment,
        Department::ElectricityBoard,
        Department::ParksRecreation,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Department::Sanitation => "Sanitation",
            Department::PublicWorks => "Public Works",
            Department::TrafficPolice => "Traffic Police",
            Department::WaterDepartment => "Water Department",
            Department::ElectricityBoard => "Electricity Board",
            Department::ParksRecreation => "Parks & Recreation",
            Department::General => "General",
        }
    }

    pub fn responsibilities(&self) -> &'static str {
        match self {
            Department::Sanitation => "Garbage collection, waste management, cleanliness, litter, overflowing bins, street cleaning, public toilet issues",
            Department::PublicWorks => "Road repairs, potholes, street construction, sidewalk issues, public infrastructure maintenance, building repairs",
            Department::TrafficPolice => "Traffic violations, signal problems, road safety, parking issues, accident reports, traffic congestion",
            Department::WaterDepartment => "Water supply issues, leakage, contamination, shortage, water quality, pipeline problems, sewage",
            Department::ElectricityBoard => "Power outages, streetlight problems, electrical faults, transformer issues, power line problems",
            Department::ParksRecreation => "Park maintenance, playground issues, garden problems, recreational facility maintenance, tree care",
            Department::General => "Anything that does not belong to a specific department",
        }
    }

    /// Exact match against the routable labels, as returned by the AI
    /// service. Anything else is rejected.
    pub fn from_routing_label(label: &str) -> Option<Department> {
        let label = label.trim();
        Department::ROUTABLE
            .into_iter()
            .find(|department| department.as_str() == label)
    }
}

impl fmt::Display for Department {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Department {
    type Err = String;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        let normalized = input.trim().to_lowercase().replace(['-', '_'], " ");
        match normalized.as_str() {
            "sanitation" => Ok(Department::Sanitation),
            "public works" | "publicworks" => Ok(Department::PublicWorks),
            "traffic police" | "traffic" => Ok(Department::TrafficPolice),
            "water department" | "water" => Ok(Department::WaterDepartment),
            "electricity board" | "electricity" => Ok(Department::ElectricityBoard),
            "parks & recreation" | "parks and recreation" | "parks" => {
                Ok(Department::ParksRecreation)
            }
            "general" | "other" | "other/general" => Ok(Department::General),
            other => Err(format!("Unknown department: {other}")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum IssueStatus {
    Pending,
    #[serde(rename = "In Progress")]
    InProgress,
    Resolved,
    Closed,
}

impl Default for IssueStatus {
    fn default() -> Self {
        Self::Pending
    }
}

impl IssueStatus {
    pub const ALL: [IssueStatus; 4] = [
        IssueStatus::Pending,
        IssueStatus::InProgress,
        IssueStatus::Resolved,
        IssueStatus::Closed,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            IssueStatus::Pending => "Pending",
            IssueStatus::InProgress => "In Progress",
            IssueStatus::Resolved => "Resolved",
            IssueStatus::Closed => "Closed",
        }
    }

    /// Sort weight used by the urgency ordering; open work ranks higher.
    pub fn urgency_weight(&self) -> u8 {
        match self {
            IssueStatus::Pending => 3,
            IssueStatus::InProgress => 2,
            IssueStatus::Resolved => 1,
            IssueStatus::Closed => 0,
        }
    }
}

impl fmt::Display for IssueStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for IssueStatus {
    type Err = String;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        let normalized = input.trim().to_lowercase();
        match normalized.as_str() {
            "pending" => Ok(IssueStatus::Pending),
            "in progress" | "in-progress" | "in_progress" | "inprogress" => {
                Ok(IssueStatus::InProgress)
            }
            "resolved" => Ok(IssueStatus::Resolved),
            "closed" => Ok(IssueStatus::Closed),
            other => Err(format!("Unknown status: {other}")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum IssuePriority {
    High,
    Medium,
    Low,
}

impl Default for IssuePriority {
    fn default() -> Self {
        Self::Medium
    }
}

impl IssuePriority {
    pub const ALL: [IssuePriority; 3] =
        [IssuePriority::High, IssuePriority::Medium, IssuePriority::Low];

    pub fn as_str(&self) -> &'static str {
        match self {
            IssuePriority::High => "High",
            IssuePriority::Medium => "Medium",
            IssuePriority::Low => "Low",
        }
    }

    pub fn weight(&self) -> u8 {
        match self {
            IssuePriority::High => 3,
            IssuePriority::Medium => 2,
            IssuePriority::Low => 1,
        }
    }
}

impl fmt::Display for IssuePriority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for IssuePriority {
    type Err = String;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        let normalized = input.trim().to_lowercase();
        match normalized.as_str() {
            "high" => Ok(IssuePriority::High),
            "medium" => Ok(IssuePriority::Medium),
            "low" => Ok(IssuePriority::Low),
            other => Err(format!("Unknown priority: {other}")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RoutingMethod {
    #[serde(rename = "AI")]
    Ai,
    Manual,
    Fallback,
}

impl Default for RoutingMethod {
    fn default() -> Self {
        Self::Fallback
    }
}

impl RoutingMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            RoutingMethod::Ai => "AI",
            RoutingMethod::Manual => "Manual",
            RoutingMethod::Fallback => "Fallback",
        }
    }
}

impl fmt::Display for RoutingMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

pub fn scan_text(title: &str, description: &str) -> String {
    format!("{title} {description}").to_lowercase()
}

pub fn now_timestamp() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Parses RFC 3339 timestamps and the offset-less ISO form older documents
/// carry. Offset-less values were stamped in the host's local time and are
/// read that way; a wall time skipped by a DST jump does not parse.
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    if let Ok(parsed) = DateTime::parse_from_rfc3339(raw) {
        return Some(parsed.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
        .or_else(|_| NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S%.f"))
        .ok()
        .and_then(|naive| Local.from_local_datetime(&naive).earliest())
        .map(|local| local.with_timezone(&Utc))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_json() -> &'static str {
        r#"{
            "id": "c0ffee00-0000-4000-8000-000000000001",
            "title": "Overflowing bin",
            "description": "Bin near the market has not been emptied",
            "location": "Market Road",
            "latitude": 12.97,
            "longitude": 77.59,
            "reporter_name": "Asha",
            "phone": "9876543210",
            "email": null,
            "preferred_contact": "SMS",
            "priority": "High",
            "status": "In Progress",
            "department": "Sanitation",
            "routing_method": "AI",
            "ai_confidence": 0.92,
            "timestamp": "2025-08-01T10:15:00",
            "image_data": null,
            "manual_department": null
        }"#
    }

    #[test]
    fn decodes_issue_and_keeps_unknown_keys() {
        let issue: Issue = serde_json::from_str(sample_json()).expect("decode issue");
        assert_eq!(issue.status, IssueStatus::InProgress);
        assert_eq!(issue.department, Department::Sanitation);
        assert_eq!(issue.routing_method, RoutingMethod::Ai);
        assert!(issue.reassignment_history.is_empty());
        assert!(issue.extra.contains_key("manual_department"));

        let encoded = serde_json::to_value(&issue).expect("encode issue");
        assert_eq!(encoded["status"], "In Progress");
        assert_eq!(encoded["routing_method"], "AI");
        assert!(encoded.get("manual_department").is_some());
        for absent in ["last_updated", "admin_notes", "reassignment_history"] {
            assert!(encoded.get(absent).is_none(), "{absent} was added on encode");
        }
    }

    #[test]
    fn department_aliases_collapse_to_general() {
        for raw in ["\"General\"", "\"Other\"", "\"Other/General\""] {
            let department: Department = serde_json::from_str(raw).expect("decode department");
            assert_eq!(department, Department::General);
        }
        assert!(serde_json::from_str::<Department>("\"Fire Brigade\"").is_err());
    }

    #[test]
    fn routing_labels_exclude_general() {
        assert_eq!(
            Department::from_routing_label("Water Department"),
            Some(Department::WaterDepartment)
        );
        assert_eq!(Department::from_routing_label("General"), None);
        assert_eq!(Department::from_routing_label("water department"), None);
    }

    #[test]
    fn status_parses_cli_spellings() {
        assert_eq!("in-progress".parse::<IssueStatus>(), Ok(IssueStatus::InProgress));
        assert_eq!("In Progress".parse::<IssueStatus>(), Ok(IssueStatus::InProgress));
        assert!("reopened".parse::<IssueStatus>().is_err());
    }

    #[test]
    fn parses_naive_and_offset_timestamps() {
        let expected = Utc.with_ymd_and_hms(2025, 8, 1, 10, 15, 0).single().unwrap();
        let local = Local
            .with_ymd_and_hms(2025, 8, 1, 10, 15, 0)
            .earliest()
            .unwrap()
            .with_timezone(&Utc);
        assert_eq!(parse_timestamp("2025-08-01T10:15:00"), Some(local));
        assert_eq!(
            parse_timestamp("2025-08-01 10:15:00.250"),
            Some(local + chrono::Duration::milliseconds(250))
        );
        assert_eq!(parse_timestamp("2025-08-01T10:15:00.000Z"), Some(expected));
        assert_eq!(parse_timestamp("2025-08-01T12:15:00+02:00"), Some(expected));
        assert_eq!(parse_timestamp("yesterday"), None);
        assert_eq!(parse_timestamp(""), None);
    }
}
