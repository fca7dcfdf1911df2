use chrono::{DateTime, Local, TimeZone, Utc};
use civic_core::accounts::{authenticate, builtin_accounts};
use civic_core::{
    Department, Issue, IssueFilter, IssuePriority, IssueSort, IssueStatus, Session,
    REASSIGNMENT_REASON,
};
use civic_lifecycle::{LifecycleError, LifecycleManager, DEFAULT_ESCALATION_KEYWORDS};
use civic_routing::Classifier;
use civic_storage::{IssueStore, StoreError};
use serde_json::json;
use std::fs;
use std::path::Path;

fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 9, 1, 12, 0, 0)
        .single()
        .expect("valid timestamp")
}

fn admin() -> Session {
    authenticate(&builtin_accounts(), "admin", "admin123").expect("admin login")
}

fn staff() -> Session {
    authenticate(&builtin_accounts(), "staff", "staff123").expect("staff login")
}

fn issue(id: &str, title: &str, status: &str, timestamp: &str) -> Issue {
    serde_json::from_value(json!({
        "id": id,
        "title": title,
        "description": "",
        "location": "Ward 3",
        "reporter_name": "Meera",
        "phone": "9000000001",
        "priority": "Low",
        "status": status,
        "department": "Public Works",
        "routing_method": "Fallback",
        "ai_confidence": 0.3,
        "timestamp": timestamp,
    }))
    .expect("fixture issue")
}

fn seeded(dir: &Path, issues: &[Issue]) -> LifecycleManager {
    let store = IssueStore::in_dir(dir);
    store.save(issues).expect("seed store");
    LifecycleManager::new(store, Classifier::offline())
}

#[test]
fn reassignment_history_chains_departments() {
    let dir = tempfile::tempdir().expect("tempdir");
    let manager = seeded(
        dir.path(),
        &[issue("r1", "pothole", "Pending", "2025-08-30T10:00:00")],
    );

    manager
        .reassign_department(&staff(), "r1", Department::WaterDepartment)
        .expect("first reassignment");
    let updated = manager
        .reassign_department(&staff(), "r1", Department::Sanitation)
        .expect("second reassignment");

    assert_eq!(updated.department, Department::Sanitation);
    let hops = updated
        .reassignment_history
        .iter()
        .map(|entry| (entry.from, entry.to))
        .collect::<Vec<_>>();
    assert_eq!(
        hops,
        vec![
            (Department::PublicWorks, Department::WaterDepartment),
            (Department::WaterDepartment, Department::Sanitation),
        ]
    );
    assert!(updated
        .reassignment_history
        .iter()
        .all(|entry| entry.reason == REASSIGNMENT_REASON));
    assert_eq!(manager.get_issue("r1").expect("reload"), updated);
}

#[test]
fn n_reassignments_record_n_linked_entries() {
    let dir = tempfile::tempdir().expect("tempdir");
    let manager = seeded(
        dir.path(),
        &[issue("r2", "streetlight", "Pending", "2025-08-30T10:00:00")],
    );

    let route = [
        Department::ElectricityBoard,
        Department::General,
        Department::TrafficPolice,
        Department::ElectricityBoard,
        Department::ParksRecreation,
    ];
    for department in route {
        manager
            .reassign_department(&admin(), "r2", department)
            .expect("reassign");
    }

    let history = manager.get_issue("r2").expect("reload").reassignment_history;
    assert_eq!(history.len(), route.len());
    assert_eq!(history[0].from, Department::PublicWorks);
    for pair in history.windows(2) {
        assert_eq!(pair[1].from, pair[0].to);
    }
    assert_eq!(history[route.len() - 1].to, Department::ParksRecreation);
}

#[test]
fn unknown_id_leaves_the_document_untouched() {
    let dir = tempfile::tempdir().expect("tempdir");
    let manager = seeded(
        dir.path(),
        &[issue("u1", "garbage pile", "Pending", "2025-08-30T10:00:00")],
    );
    let before = fs::read(manager.store().path()).expect("read before");

    let err = manager
        .update_status(&staff(), "missing", IssueStatus::Resolved, Some("done"))
        .expect_err("unknown id");
    assert!(matches!(err, LifecycleError::NotFound { ref id } if id == "missing"));
    assert!(matches!(
        manager.reassign_department(&staff(), "missing", Department::Sanitation),
        Err(LifecycleError::NotFound { .. })
    ));

    let after = fs::read(manager.store().path()).expect("read after");
    assert_eq!(before, after);
}

#[test]
fn status_update_stamps_time_and_keeps_notes_unless_replaced() {
    let dir = tempfile::tempdir().expect("tempdir");
    let manager = seeded(
        dir.path(),
        &[issue("s1", "broken bench", "Pending", "2025-08-30T10:00:00")],
    );

    let first = manager
        .update_status(&staff(), "s1", IssueStatus::InProgress, Some("crew on site"))
        .expect("update");
    assert_eq!(first.status, IssueStatus::InProgress);
    assert!(first.last_updated.is_some());
    assert_eq!(first.admin_notes.as_deref(), Some("crew on site"));

    let second = manager
        .update_status(&staff(), "s1", IssueStatus::Resolved, Some("   "))
        .expect("update");
    assert_eq!(second.status, IssueStatus::Resolved);
    assert_eq!(second.admin_notes.as_deref(), Some("crew on site"));
}

#[test]
fn cleanup_only_removes_old_resolved_issues() {
    let dir = tempfile::tempdir().expect("tempdir");
    let manager = seeded(
        dir.path(),
        &[
            issue("old-resolved", "a", "Resolved", "2025-04-01T08:00:00"),
            issue("new-resolved", "b", "Resolved", "2025-08-20T08:00:00"),
            issue("old-pending", "c", "Pending", "2025-01-01T08:00:00"),
            issue("old-closed", "d", "Closed", "2025-01-01T08:00:00"),
            issue("undated-resolved", "e", "Resolved", "sometime in spring"),
        ],
    );

    let removed = manager
        .cleanup_as_of(&admin(), 90, now())
        .expect("cleanup");
    assert_eq!(removed, 1);

    let remaining = manager
        .list_issues(&IssueFilter::default(), IssueSort::StoreOrder)
        .into_iter()
        .map(|issue| issue.id)
        .collect::<Vec<_>>();
    assert_eq!(
        remaining,
        vec!["new-resolved", "old-pending", "old-closed", "undated-resolved"]
    );

    assert_eq!(manager.cleanup_as_of(&admin(), 90, now()).expect("again"), 0);
    assert_eq!(manager.cleanup_as_of(&admin(), 0, now()).expect("zero days"), 1);
}

#[test]
fn cleanup_window_beyond_the_calendar_removes_nothing() {
    let dir = tempfile::tempdir().expect("tempdir");
    let manager = seeded(
        dir.path(),
        &[issue("ancient", "a", "Resolved", "1970-01-02T00:00:00")],
    );
    let before = fs::read(manager.store().path()).expect("read before");

    assert_eq!(manager.cleanup(&admin(), u32::MAX).expect("cleanup"), 0);
    assert_eq!(
        manager.cleanup_as_of(&admin(), u32::MAX, now()).expect("cleanup as of"),
        0
    );
    assert_eq!(before, fs::read(manager.store().path()).expect("read after"));
}

#[test]
fn mutations_keep_records_that_do_not_decode() {
    let dir = tempfile::tempdir().expect("tempdir");
    let store = IssueStore::in_dir(dir.path());
    let odd = json!({
        "id": "odd",
        "title": "Crumbling flyover",
        "status": "Resolved",
        "department": "Roads Division",
        "timestamp": "2024-01-01T00:00:00",
    });
    let good = issue("good", "urgent pothole", "Resolved", "2024-01-01T00:00:00");
    let good = serde_json::to_value(good).expect("encode issue");
    fs::write(
        store.path(),
        serde_json::to_string_pretty(&json!([good, odd.clone()])).expect("encode document"),
    )
    .expect("write document");
    let manager = LifecycleManager::new(store, Classifier::offline());

    manager
        .update_status(&staff(), "good", IssueStatus::InProgress, Some("crew dispatched"))
        .expect("update");
    manager
        .reassign_department(&staff(), "good", Department::Sanitation)
        .expect("reassign");
    assert_eq!(
        manager.bulk_escalate(&admin(), &["urgent"]).expect("escalate"),
        1
    );
    manager
        .update_status(&staff(), "good", IssueStatus::Resolved, None)
        .expect("resolve");
    assert_eq!(manager.cleanup_as_of(&admin(), 90, now()).expect("cleanup"), 1);

    let written: Vec<serde_json::Value> =
        serde_json::from_str(&fs::read_to_string(manager.store().path()).expect("read"))
            .expect("parse document");
    assert_eq!(written, vec![odd]);
    let report = manager.validate().expect("validate");
    assert_eq!(report.total_issues, 1);
    assert_eq!(report.invalid_issues, 1);
}

#[test]
fn bulk_escalate_counts_every_matching_issue() {
    let dir = tempfile::tempdir().expect("tempdir");
    let mut already_high = issue("e3", "Fire near transformer", "Pending", "2025-08-30T10:00:00");
    already_high.priority = IssuePriority::High;
    let manager = seeded(
        dir.path(),
        &[
            issue("e1", "URGENT: open manhole", "Pending", "2025-08-30T10:00:00"),
            issue("e2", "faded paint on bench", "Pending", "2025-08-30T10:00:00"),
            already_high,
            issue("e4", "Flood in underpass", "Resolved", "2025-08-30T10:00:00"),
        ],
    );

    let escalated = manager
        .bulk_escalate(&admin(), &DEFAULT_ESCALATION_KEYWORDS)
        .expect("escalate");
    assert_eq!(escalated, 3);

    let priorities = manager
        .list_issues(&IssueFilter::default(), IssueSort::StoreOrder)
        .into_iter()
        .map(|issue| (issue.id, issue.priority))
        .collect::<Vec<_>>();
    assert_eq!(
        priorities,
        vec![
            ("e1".to_string(), IssuePriority::High),
            ("e2".to_string(), IssuePriority::Low),
            ("e3".to_string(), IssuePriority::High),
            ("e4".to_string(), IssuePriority::High),
        ]
    );
    let before = fs::read(manager.store().path()).expect("read before");
    assert_eq!(
        manager
            .bulk_escalate(&admin(), &DEFAULT_ESCALATION_KEYWORDS)
            .expect("repeat"),
        3
    );
    assert_eq!(before, fs::read(manager.store().path()).expect("read after"));
}

#[test]
fn save_after_load_is_a_no_op_on_the_document() {
    let dir = tempfile::tempdir().expect("tempdir");
    let manager = seeded(dir.path(), &[]);
    let path = manager.store().path().to_path_buf();
    manager
        .submit_issue(civic_lifecycle::IssueSubmission {
            title: "Leaking pipe".to_string(),
            description: "water everywhere".to_string(),
            location: "Block C".to_string(),
            reporter_name: "Kiran".to_string(),
            phone: "9988776655".to_string(),
            email: Some("kiran@example.com".to_string()),
            image: Some(vec![0xff, 0xd8, 0xff]),
            ..Default::default()
        })
        .expect("submit");

    let before = fs::read(&path).expect("read");
    let store = IssueStore::new(&path);
    store.save(&store.load().expect("load")).expect("save");
    assert_eq!(before, fs::read(&path).expect("reread"));
    store
        .save_document(&store.load_document().expect("load document"))
        .expect("save document");
    assert_eq!(before, fs::read(&path).expect("reread document"));
}

#[test]
fn corrupt_document_blocks_mutations_without_overwriting() {
    let dir = tempfile::tempdir().expect("tempdir");
    let store = IssueStore::in_dir(dir.path());
    fs::write(store.path(), "{ not an array").expect("write corrupt");
    let manager = LifecycleManager::new(store, Classifier::offline());

    assert!(matches!(
        manager.update_status(&staff(), "x", IssueStatus::Closed, None),
        Err(LifecycleError::Store(StoreError::Corrupt { .. }))
    ));
    assert!(manager
        .list_issues(&IssueFilter::default(), IssueSort::Latest)
        .is_empty());
    assert_eq!(
        fs::read_to_string(manager.store().path()).expect("read"),
        "{ not an array"
    );
}

#[test]
fn backup_and_restore_require_the_right_roles() {
    let dir = tempfile::tempdir().expect("tempdir");
    let manager = seeded(
        dir.path(),
        &[issue("b1", "tree fallen", "Pending", "2025-08-30T10:00:00")],
    );
    let stamp = Local
        .with_ymd_and_hms(2025, 9, 1, 9, 30, 0)
        .single()
        .expect("local time");

    let backup = manager.backup(&staff(), stamp).expect("backup");
    assert!(backup.ends_with("backups/issues_20250901_093000.json"));

    manager
        .update_status(&staff(), "b1", IssueStatus::Resolved, None)
        .expect("update");
    assert!(matches!(
        manager.restore(&staff(), &backup),
        Err(LifecycleError::Auth(_))
    ));
    assert_eq!(manager.restore(&admin(), &backup).expect("restore"), 1);
    assert_eq!(
        manager.get_issue("b1").expect("reload").status,
        IssueStatus::Pending
    );
}

#[test]
fn listing_filters_sorts_and_export_hides_private_fields() {
    let dir = tempfile::tempdir().expect("tempdir");
    let mut noted = issue("l2", "Broken streetlight", "In Progress", "2025-08-29T10:00:00");
    noted.priority = IssuePriority::High;
    noted.department = Department::ElectricityBoard;
    noted.admin_notes = Some("ladder truck booked".to_string());
    noted.image_data = Some("QUJD".to_string());
    let manager = seeded(
        dir.path(),
        &[
            issue("l1", "Pothole", "Pending", "2025-08-25T10:00:00"),
            noted,
            issue("l3", "Garbage", "Resolved", "2025-08-31T10:00:00"),
        ],
    );

    let latest = manager
        .list_issues(&IssueFilter::default(), IssueSort::Latest)
        .into_iter()
        .map(|issue| issue.id)
        .collect::<Vec<_>>();
    assert_eq!(latest, vec!["l3", "l2", "l1"]);

    let open = IssueFilter {
        statuses: vec![IssueStatus::Pending, IssueStatus::InProgress],
        ..IssueFilter::default()
    };
    let by_priority = manager
        .list_issues(&open, IssueSort::Priority)
        .into_iter()
        .map(|issue| issue.id)
        .collect::<Vec<_>>();
    assert_eq!(by_priority, vec!["l2", "l1"]);

    let rows = manager.export(&IssueFilter {
        departments: vec![Department::ElectricityBoard],
        ..IssueFilter::default()
    });
    assert_eq!(rows.len(), 1);
    let exported = serde_json::to_value(&rows[0]).expect("encode row");
    assert_eq!(exported["id"], "l2");
    assert!(exported.get("image_data").is_none());
    assert!(exported.get("admin_notes").is_none());

    let stats = manager.statistics();
    assert_eq!(stats.overall.total, 3);
    assert_eq!(manager.reporters().len(), 1);
}
