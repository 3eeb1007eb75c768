#![forbid(unsafe_code)]

use chrono::{Duration, TimeZone, Utc};
use safesound_contracts::alert::{AlertCreateInput, AlertId, AlertStatus, Severity};
use safesound_contracts::user::UserId;
use safesound_storage::alerts::AlertStore;
use safesound_storage::repo::{AlertRepo, StorageError, MAX_RECENT_LIMIT};

fn t0() -> chrono::DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 3, 1, 8, 0, 0).unwrap()
}

fn user() -> UserId {
    UserId::new("dbw_alert_user_1").unwrap()
}

fn input(alert_type: &str, confidence: u8) -> AlertCreateInput {
    AlertCreateInput::v1(Some(user()), alert_type, confidence, None).unwrap()
}

#[test]
fn at_alerts_db_01_create_assigns_id_and_active_status() {
    let mut s = AlertStore::new_in_memory();
    let a = s.create_alert(input("Glass_Breaking", 82), t0()).unwrap();
    assert_eq!(a.id, AlertId(1));
    assert_eq!(a.status, AlertStatus::Active);
    assert_eq!(a.severity, Severity::High);
    assert_eq!(a.location, "Unknown");
    assert_eq!(a.created_at, t0());
    assert_eq!(s.alert(a.id), Some(&a));
}

#[test]
fn at_alerts_db_02_no_dedup_every_call_creates_a_row() {
    let mut s = AlertStore::new_in_memory();
    let a = s.create_alert(input("scream", 50), t0()).unwrap();
    let b = s.create_alert(input("scream", 50), t0()).unwrap();
    assert_ne!(a.id, b.id);
    assert_eq!(s.len(), 2);
}

#[test]
fn at_alerts_db_03_tampered_severity_rejected() {
    let mut s = AlertStore::new_in_memory();
    let mut bad = input("scream", 50);
    bad.severity = Severity::High;
    assert!(matches!(
        s.create_alert(bad, t0()),
        Err(StorageError::ContractViolation(_))
    ));
    assert!(s.is_empty());
}

#[test]
fn at_alerts_db_04_list_recent_newest_first_and_capped() {
    let mut s = AlertStore::new_in_memory();
    for i in 0..(MAX_RECENT_LIMIT as i64 + 5) {
        s.create_alert(input("crash", 60), t0() + Duration::seconds(i))
            .unwrap();
    }
    let recent = s.list_recent(3);
    assert_eq!(recent.len(), 3);
    assert!(recent[0].created_at > recent[1].created_at);
    assert!(recent[1].id > recent[2].id);
    assert_eq!(s.list_recent(10_000).len(), MAX_RECENT_LIMIT);
    assert!(s.list_recent(0).is_empty());
}

#[test]
fn at_alerts_db_05_status_transitions_enforced() {
    let mut s = AlertStore::new_in_memory();
    let a = s.create_alert(input("alarm", 70), t0()).unwrap();
    let b = s.create_alert(input("alarm", 70), t0()).unwrap();

    let resolved = s
        .update_status(a.id, AlertStatus::Resolved, Some(" operator_1 ".to_string()), t0() + Duration::minutes(5))
        .unwrap();
    assert_eq!(resolved.status, AlertStatus::Resolved);
    assert_eq!(resolved.resolved_at, Some(t0() + Duration::minutes(5)));
    assert_eq!(resolved.resolved_by.as_deref(), Some("operator_1"));

    let err = s
        .update_status(a.id, AlertStatus::Dismissed, None, t0())
        .unwrap_err();
    assert!(matches!(
        err,
        StorageError::InvalidTransition {
            from: AlertStatus::Resolved,
            to: AlertStatus::Dismissed,
            ..
        }
    ));

    let dismissed = s.update_status(b.id, AlertStatus::Dismissed, None, t0()).unwrap();
    assert_eq!(dismissed.status, AlertStatus::Dismissed);
    assert!(dismissed.resolved_at.is_none());

    assert!(matches!(
        s.update_status(AlertId(99), AlertStatus::Resolved, None, t0()),
        Err(StorageError::NotFound { .. })
    ));
}

#[test]
fn at_alerts_db_06_stats_by_status_and_type() {
    let mut s = AlertStore::new_in_memory();
    s.create_alert(input("scream", 50), t0()).unwrap();
    s.create_alert(input("scream", 81), t0()).unwrap();
    s.create_alert(input("scream", 60), t0()).unwrap();
    let g = s.create_alert(input("glass", 90), t0()).unwrap();
    s.create_alert(input("alarm", 40), t0()).unwrap();
    s.update_status(g.id, AlertStatus::Resolved, None, t0()).unwrap();

    let counts = s.count_by_status();
    assert_eq!(counts.active, 4);
    assert_eq!(counts.resolved, 1);
    assert_eq!(counts.dismissed, 0);
    assert_eq!(counts.total, 5);

    let by_type = s.aggregate_by_type();
    assert_eq!(by_type[0].alert_type, "scream");
    assert_eq!(by_type[0].count, 3);
    assert_eq!(by_type[0].average_confidence, 64);
    assert_eq!(by_type[1].alert_type, "alarm");
    assert_eq!(by_type[2].alert_type, "glass");
}
