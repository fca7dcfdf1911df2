use crate::{Department, Issue, IssuePriority, IssueStatus, RoutingMethod};
use chrono::{Local, NaiveDate};
use std::cmp::Reverse;
use serde::Serialize;
use std::fmt;
use std::str::FromStr;

/// Dashboard filter. Empty sets match everything; the date range is
/// inclusive and applies to the creation date.
#[derive(Debug, Clone, Default)]
pub struct IssueFilter {
    pub statuses: Vec<IssueStatus>,
    pub departments: Vec<Department>,
    pub priorities: Vec<IssuePriority>,
    pub since: Option<NaiveDate>,
    pub until: Option<NaiveDate>,
    pub phone: Option<String>,
    pub search: Option<String>,
}

impl IssueFilter {
    pub fn is_empty(&self) -> bool {
        self.statuses.is_empty()
            && self.departments.is_empty()
            && self.priorities.is_empty()
            && self.since.is_none()
            && self.until.is_none()
            && self.phone.is_none()
            && self.search.is_none()
    }

    pub fn matches(&self, issue: &Issue) -> bool {
        if !self.statuses.is_empty() && !self.statuses.contains(&issue.status) {
            return false;
        }
        if !self.departments.is_empty() && !self.departments.contains(&issue.department) {
            return false;
        }
        if !self.priorities.is_empty() && !self.priorities.contains(&issue.priority) {
            return false;
        }
        if let Some(phone) = &self.phone {
            if issue.phone != *phone {
                return false;
            }
        }
        if self.since.is_some() || self.until.is_some() {
            // Undated issues cannot be placed in a range.
            let Some(created) = issue
                .created_at()
                .map(|ts| ts.with_timezone(&Local).date_naive())
            else {
                return false;
            };
            if self.since.is_some_and(|since| created < since) {
                return false;
            }
            if self.until.is_some_and(|until| created > until) {
                return false;
            }
        }
        if let Some(query) = &self.search {
            let query = query.trim().to_lowercase();
            if !query.is_empty()
                && !issue.title.to_lowercase().contains(&query)
                && !issue.description.to_lowercase().contains(&query)
                && !issue.location.to_lowercase().contains(&query)
            {
                return false;
            }
        }
        true
    }

    pub fn apply<'a>(&self, issues: &'a [Issue]) -> Vec<&'a Issue> {
        issues.iter().filter(|issue| self.matches(issue)).collect()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum IssueSort {
    #[default]
    StoreOrder,
    Latest,
    Oldest,
    Priority,
    Department,
    Urgency,
}

impl IssueSort {
    pub fn as_str(&self) -> &'static str {
        match self {
            IssueSort::StoreOrder => "store",
            IssueSort::Latest => "latest",
            IssueSort::Oldest => "oldest",
            IssueSort::Priority => "priority",
            IssueSort::Department => "department",
            IssueSort::Urgency => "urgency",
        }
    }

    /// Stable sort, so equal keys keep store order. Date sorts compare the
    /// parsed creation time and put unparseable timestamps last.
    pub fn sort(&self, issues: &mut [&Issue]) {
        match self {
            IssueSort::StoreOrder => {}
            IssueSort::Latest => issues.sort_by_cached_key(|issue| {
                let created = issue.created_at();
                (created.is_none(), created.map(Reverse))
            }),
            IssueSort::Oldest => issues.sort_by_cached_key(|issue| {
                let created = issue.created_at();
                (created.is_none(), created)
            }),
            IssueSort::Priority => {
                issues.sort_by(|a, b| b.priority.weight().cmp(&a.priority.weight()))
            }
            IssueSort::Department => {
                issues.sort_by(|a, b| a.department.as_str().cmp(b.department.as_str()))
            }
            IssueSort::Urgency => issues.sort_by(|a, b| urgency(b).cmp(&urgency(a))),
        }
    }
}

fn urgency(issue: &Issue) -> u8 {
    issue.priority.weight() + issue.status.urgency_weight()
}

impl fmt::Display for IssueSort {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for IssueSort {
    type Err = String;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        match input.trim().to_lowercase().as_str() {
            "store" | "none" => Ok(IssueSort::StoreOrder),
            "latest" | "newest" => Ok(IssueSort::Latest),
            "oldest" => Ok(IssueSort::Oldest),
            "priority" => Ok(IssueSort::Priority),
            "department" => Ok(IssueSort::Department),
            "urgency" => Ok(IssueSort::Urgency),
            other => Err(format!("Unknown sort order: {other}")),
        }
    }
}

/// Export shape of an issue: everything except the photo and staff notes.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExportRow {
    pub id: String,
    pub title: String,
    pub description: String,
    pub location: String,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub reporter_name: String,
    pub phone: String,
    pub email: Option<String>,
    pub preferred_contact: String,
    pub priority: IssuePriority,
    pub status: IssueStatus,
    pub department: Department,
    pub routing_method: RoutingMethod,
    pub ai_confidence: f64,
    pub timestamp: String,
    pub last_updated: Option<String>,
    pub reassignments: usize,
}

impl ExportRow {
    pub const COLUMNS: [&'static str; 18] = [
        "id",
        "title",
        "description",
        "location",
        "latitude",
        "longitude",
        "reporter_name",
        "phone",
        "email",
        "preferred_contact",
        "priority",
        "status",
        "department",
        "routing_method",
        "ai_confidence",
        "timestamp",
        "last_updated",
        "reassignments",
    ];

    pub fn record(&self) -> Vec<String> {
        fn opt<T: ToString>(value: &Option<T>) -> String {
            value.as_ref().map(ToString::to_string).unwrap_or_default()
        }

        vec![
            self.id.clone(),
            self.title.clone(),
            self.description.clone(),
            self.location.clone(),
            opt(&self.latitude),
            opt(&self.longitude),
            self.reporter_name.clone(),
            self.phone.clone(),
            opt(&self.email),
            self.preferred_contact.clone(),
            self.priority.to_string(),
            self.status.to_string(),
            self.department.to_string(),
            self.routing_method.to_string(),
            self.ai_confidence.to_string(),
            self.timestamp.clone(),
            opt(&self.last_updated),
            self.reassignments.to_string(),
        ]
    }
}

impl From<&Issue> for ExportRow {
    fn from(issue: &Issue) -> Self {
        Self {
            id: issue.id.clone(),
            title: issue.title.clone(),
            description: issue.description.clone(),
            location: issue.location.clone(),
            latitude: issue.latitude,
            longitude: issue.longitude,
            reporter_name: issue.reporter_name.clone(),
            phone: issue.phone.clone(),
            email: issue.email.clone(),
            preferred_contact: issue.preferred_contact.clone(),
            priority: issue.priority,
            status: issue.status,
            department: issue.department,
            routing_method: issue.routing_method,
            ai_confidence: issue.ai_confidence,
            timestamp: issue.timestamp.clone(),
            last_updated: issue.last_updated.clone(),
            reassignments: issue.reassignment_history.len(),
        }
    }
}
