#![forbid(unsafe_code)]

use std::io::Write;

use safesound_contracts::user::{EmergencyContact, UserId, UserProfile};
use safesound_storage::repo::{StorageError, UserRepo};
use safesound_storage::users::UserStore;

fn profile(id: &str, contacts: usize) -> UserProfile {
    UserProfile {
        id: UserId::new(id).unwrap(),
        name: "Asha".to_string(),
        email: Some("asha@example.com".to_string()),
        phone: Some("9876500000".to_string()),
        emergency_contacts: (0..contacts)
            .map(|i| EmergencyContact {
                name: Some(format!("Contact {i}")),
                email: format!("c{i}@example.com"),
                phone: format!("98765111{i:02}"),
            })
            .collect(),
    }
}

#[test]
fn at_users_db_01_insert_and_lookup() {
    let mut s = UserStore::new_in_memory();
    s.insert_user(profile("dbw_user_1", 2)).unwrap();
    let u = s.user(&UserId::new("dbw_user_1").unwrap()).unwrap();
    assert_eq!(u.emergency_contacts.len(), 2);
    assert!(s.user(&UserId::new("missing").unwrap()).is_none());
}

#[test]
fn at_users_db_02_duplicate_and_invalid_rejected() {
    let mut s = UserStore::new_in_memory();
    s.insert_user(profile("dbw_user_1", 0)).unwrap();
    assert!(matches!(
        s.insert_user(profile("dbw_user_1", 0)),
        Err(StorageError::DuplicateKey { .. })
    ));
    assert!(matches!(
        s.insert_user(profile("dbw_user_2", 11)),
        Err(StorageError::ContractViolation(_))
    ));
    assert_eq!(s.user_count(), 1);
}

#[test]
fn at_users_db_03_load_from_json_file() {
    let mut f = tempfile::NamedTempFile::new().unwrap();
    write!(
        f,
        r#"[
            {{"id":"u1","name":"Asha","email":"asha@example.com","phone":"9876500000",
              "emergencyContacts":[{{"name":"Ravi","email":"ravi@example.com","phone":"9876500001"}}]}},
            {{"id":"u2","name":"Bo"}}
        ]"#
    )
    .unwrap();
    let s = UserStore::load_from_json_file(f.path()).unwrap();
    assert_eq!(s.user_count(), 2);
    let bo = s.user(&UserId::new("u2").unwrap()).unwrap();
    assert!(bo.emergency_contacts.is_empty());
    assert!(bo.email.is_none());
}

#[test]
fn at_users_db_04_bad_file_is_unavailable() {
    let dir = tempfile::tempdir().unwrap();
    assert!(matches!(
        UserStore::load_from_json_file(dir.path().join("nope.json")),
        Err(StorageError::Unavailable { .. })
    ));
    assert!(matches!(
        UserStore::load_from_json_str("{not json"),
        Err(StorageError::Unavailable { .. })
    ));
}
