use crate::{Issue, IssueStatus};
use serde::Serialize;
use std::collections::BTreeMap;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct StatusTally {
    pub total: usize,
    pub pending: usize,
    pub in_progress: usize,
    pub resolved: usize,
    pub closed: usize,
}

impl StatusTally {
    fn record(&mut self, status: IssueStatus) {
        self.total += 1;
        match status {
            IssueStatus::Pending => self.pending += 1,
            IssueStatus::InProgress => self.in_progress += 1,
            IssueStatus::Resolved => self.resolved += 1,
            IssueStatus::Closed => self.closed += 1,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct IssueStatistics {
    #[serde(flatten)]
    pub overall: StatusTally,
    /// Percentage of issues in `Resolved`, 0 when there are none.
    pub resolution_rate: f64,
    pub departments: BTreeMap<String, StatusTally>,
    pub priorities: BTreeMap<String, usize>,
}

impl IssueStatistics {
    pub fn from_issues(issues: &[Issue]) -> Self {
        let mut stats = IssueStatistics::default();
        for issue in issues {
            stats.overall.record(issue.status);
            stats
                .departments
                .entry(issue.department.to_string())
                .or_default()
                .record(issue.status);
            *stats
                .priorities
                .entry(issue.priority.to_string())
                .or_default() += 1;
        }
        if stats.overall.total > 0 {
            stats.resolution_rate =
                stats.overall.resolved as f64 / stats.overall.total as f64 * 100.0;
        }
        stats
    }
}

/// Per-reporter activity, keyed by phone number.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReporterSummary {
    pub phone: String,
    pub name: String,
    pub email: Option<String>,
    pub total_issues: usize,
    pub resolved_issues: usize,
    pub last_report: String,
}

/// Summaries in first-seen order; issues without a phone are not counted.
pub fn reporter_summaries(issues: &[Issue]) -> Vec<ReporterSummary> {
    let mut order = Vec::<String>::new();
    let mut by_phone = BTreeMap::<String, ReporterSummary>::new();

    for issue in issues {
        if issue.phone.is_empty() {
            continue;
        }
        let summary = by_phone.entry(issue.phone.clone()).or_insert_with(|| {
            order.push(issue.phone.clone());
            ReporterSummary {
                phone: issue.phone.clone(),
                name: issue.reporter_name.clone(),
                email: issue.email.clone(),
                total_issues: 0,
                resolved_issues: 0,
                last_report: issue.timestamp.clone(),
            }
        });
        summary.total_issues += 1;
        if issue.status == IssueStatus::Resolved {
            summary.resolved_issues += 1;
        }
        if issue.timestamp > summary.last_report {
            summary.last_report = issue.timestamp.clone();
        }
    }

    order
        .into_iter()
        .filter_map(|phone| by_phone.remove(&phone))
        .collect()
}
