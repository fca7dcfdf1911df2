//! Issue submission, dashboard queries and the staff-facing lifecycle
//! operations over an [`IssueStore`].
//!
//! Every mutation runs the capability check first, then loads the whole
//! document, changes it and saves it back.

use chrono::{DateTime, Duration, Local, Utc};
use civic_core::{
    ensure_permission, now_timestamp, reporter_summaries, AuthError, Department, ExportRow,
    Issue, IssueFilter, IssuePriority, IssueSort, IssueStatistics, IssueStatus, ReassignmentEntry,
    ReporterSummary, Role, RoutingMethod, Session, REASSIGNMENT_REASON,
};
use civic_routing::{estimate_priority, Classifier, IssueContext};
use civic_storage::{IntegrityReport, IssueStore, StoreError};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::info;
use uuid::Uuid;

pub mod submission;

pub use submission::{IssueSubmission, SubmissionError};

pub const DEFAULT_ESCALATION_KEYWORDS: [&str; 6] =
    ["emergency", "urgent", "danger", "accident", "fire", "flood"];
pub const DEFAULT_CLEANUP_DAYS: u32 = 90;

#[derive(Debug, Error)]
pub enum LifecycleError {
    #[error("issue {id} not found")]
    NotFound { id: String },
    #[error(transparent)]
    Auth(#[from] AuthError),
    #[error(transparent)]
    Submission(#[from] SubmissionError),
    #[error(transparent)]
    Store(#[from] StoreError),
}

pub type Result<T> = std::result::Result<T, LifecycleError>;

pub struct LifecycleManager {
    store: IssueStore,
    classifier: Classifier,
}

impl LifecycleManager {
    pub fn new(store: IssueStore, classifier: Classifier) -> Self {
        Self { store, classifier }
    }

    pub fn store(&self) -> &IssueStore {
        &self.store
    }

    /// Validates, prioritises, routes and persists a new report.
    pub fn submit_issue(&self, submission: IssueSubmission) -> Result<Issue> {
        submission.validate()?;

        let image_data = submission.image_base64();
        let priority = submission.priority.unwrap_or_else(|| {
            estimate_priority(&format!("{} {}", submission.title, submission.description))
        });

        let (department, ai_confidence, routing_method) = match submission.department {
            Some(department) => (department, 1.0, RoutingMethod::Manual),
            None => {
                let context = IssueContext {
                    title: submission.title.clone(),
                    description: submission.description.clone(),
                    location: submission.location.clone(),
                    image_provided: image_data.is_some(),
                };
                let routed = self.classifier.classify(&context, image_data.as_deref());
                (routed.department, routed.confidence, routed.method)
            }
        };

        let issue = Issue {
            id: Uuid::new_v4().to_string(),
            title: submission.title.trim().to_string(),
            description: submission.description.trim().to_string(),
            location: submission.location.trim().to_string(),
            latitude: submission.latitude,
            longitude: submission.longitude,
            reporter_name: submission.reporter_name.trim().to_string(),
            phone: submission.phone.trim().to_string(),
            email: submission.email(),
            preferred_contact: submission.preferred_contact(),
            priority,
            status: IssueStatus::Pending,
            department,
            routing_method,
            ai_confidence,
            timestamp: now_timestamp(),
            last_updated: None,
            image_data,
            admin_notes: None,
            reassignment_history: Vec::new(),
            extra: Default::default(),
        };

        self.store.append(issue.clone())?;
        info!(
            issue_id = %issue.id,
            department = %issue.department,
            priority = %issue.priority,
            method = %issue.routing_method,
            "issue submitted"
        );
        Ok(issue)
    }

    pub fn list_issues(&self, filter: &IssueFilter, sort: IssueSort) -> Vec<Issue> {
        let issues = self.store.load_or_empty();
        let mut selected = filter.apply(&issues);
        sort.sort(&mut selected);
        selected.into_iter().cloned().collect()
    }

    pub fn get_issue(&self, id: &str) -> Result<Issue> {
        self.store
            .load()?
            .into_iter()
            .find(|issue| issue.id == id)
            .ok_or_else(|| LifecycleError::NotFound { id: id.to_string() })
    }

    /// Filtered rows with the image payload and staff notes left out.
    pub fn export(&self, filter: &IssueFilter) -> Vec<ExportRow> {
        let issues = self.store.load_or_empty();
        filter.apply(&issues).into_iter().map(ExportRow::from).collect()
    }

    pub fn statistics(&self) -> IssueStatistics {
        IssueStatistics::from_issues(&self.store.load_or_empty())
    }

    pub fn reporters(&self) -> Vec<ReporterSummary> {
        reporter_summaries(&self.store.load_or_empty())
    }

    pub fn validate(&self) -> Result<IntegrityReport> {
        Ok(self.store.validate()?)
    }

    /// Sets the status and stamps `last_updated`; non-blank notes replace the
    /// existing staff notes.
    pub fn update_status(
        &self,
        session: &Session,
        id: &str,
        status: IssueStatus,
        notes: Option<&str>,
    ) -> Result<Issue> {
        ensure_permission(session, Role::Staff)?;
        let updated = self.modify_issue(id, |issue| {
            issue.status = status;
            issue.touch();
            if let Some(notes) = notes.map(str::trim).filter(|notes| !notes.is_empty()) {
                issue.admin_notes = Some(notes.to_string());
            }
        })?;
        info!(issue_id = %id, status = %status, user = %session.username, "issue status updated");
        Ok(updated)
    }

    pub fn reassign_department(
        &self,
        session: &Session,
        id: &str,
        department: Department,
    ) -> Result<Issue> {
        ensure_permission(session, Role::Staff)?;
        let mut previous = department;
        let updated = self.modify_issue(id, |issue| {
            previous = issue.department;
            issue.department = department;
            issue.touch();
            issue.reassignment_history.push(ReassignmentEntry {
                from: previous,
                to: department,
                timestamp: issue.last_updated.clone().unwrap_or_else(now_timestamp),
                reason: REASSIGNMENT_REASON.to_string(),
            });
        })?;
        info!(
            issue_id = %id,
            from = %previous,
            to = %department,
            user = %session.username,
            "issue reassigned"
        );
        Ok(updated)
    }

    /// Raises every issue mentioning one of `keywords` to High. Returns how
    /// many issues matched, including ones that were already High.
    pub fn bulk_escalate<S: AsRef<str>>(&self, session: &Session, keywords: &[S]) -> Result<usize> {
        ensure_permission(session, Role::Admin)?;
        let keywords = keywords
            .iter()
            .map(|keyword| keyword.as_ref().trim().to_lowercase())
            .filter(|keyword| !keyword.is_empty())
            .collect::<Vec<_>>();
        if keywords.is_empty() {
            return Ok(0);
        }

        let mut document = self.store.load_document()?;
        let mut escalated = 0;
        let mut changed = 0;
        for issue in document.issues_mut() {
            let text = issue.scan_text();
            if !keywords.iter().any(|keyword| text.contains(keyword.as_str())) {
                continue;
            }
            escalated += 1;
            if issue.priority != IssuePriority::High {
                issue.priority = IssuePriority::High;
                issue.touch();
                changed += 1;
            }
        }
        if changed > 0 {
            self.store.save_document(&document)?;
        }
        info!(escalated, changed, user = %session.username, "bulk escalation finished");
        Ok(escalated)
    }

    pub fn cleanup(&self, session: &Session, days: u32) -> Result<usize> {
        self.cleanup_as_of(session, days, Utc::now())
    }

    /// Drops Resolved issues created before `now - days`. Issues whose
    /// timestamp cannot be parsed are kept, and a cutoff before the earliest
    /// representable time removes nothing.
    pub fn cleanup_as_of(&self, session: &Session, days: u32, now: DateTime<Utc>) -> Result<usize> {
        ensure_permission(session, Role::Admin)?;
        let Some(cutoff) = now.checked_sub_signed(Duration::days(i64::from(days))) else {
            info!(days, user = %session.username, "cleanup cutoff out of range, nothing removed");
            return Ok(0);
        };

        let mut document = self.store.load_document()?;
        let removed = document.retain_issues(|issue| {
            issue.status != IssueStatus::Resolved
                || issue.created_at().map_or(true, |created| created >= cutoff)
        });
        if removed > 0 {
            self.store.save_document(&document)?;
        }
        info!(removed, days, user = %session.username, "resolved issues cleaned up");
        Ok(removed)
    }

    pub fn backup(&self, session: &Session, now: DateTime<Local>) -> Result<PathBuf> {
        ensure_permission(session, Role::Staff)?;
        Ok(self.store.backup(now)?)
    }

    pub fn restore(&self, session: &Session, backup_path: &Path) -> Result<usize> {
        ensure_permission(session, Role::Admin)?;
        Ok(self.store.restore(backup_path)?)
    }

    /// Load, change one issue, save. An unknown id leaves the document
    /// untouched; records that do not decode are written back as they were.
    fn modify_issue<F>(&self, id: &str, change: F) -> Result<Issue>
    where
        F: FnOnce(&mut Issue),
    {
        let mut document = self.store.load_document()?;
        let issue = document
            .find_mut(id)
            .ok_or_else(|| LifecycleError::NotFound { id: id.to_string() })?;
        change(issue);
        let updated = issue.clone();
        self.store.save_document(&document)?;
        Ok(updated)
    }
}
