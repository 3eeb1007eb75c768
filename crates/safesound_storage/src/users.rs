#![forbid(unsafe_code)]

use std::collections::BTreeMap;
use std::path::Path;

use safesound_contracts::user::{UserId, UserProfile};
use safesound_contracts::Validate;

use crate::repo::{StorageError, UserRepo};

const TABLE: &str = "users";

/// In-memory snapshot of user profiles and their emergency contacts.
#[derive(Debug, Default)]
pub struct UserStore {
    users: BTreeMap<UserId, UserProfile>,
}

impl UserStore {
    pub fn new_in_memory() -> Self {
        Self::default()
    }

    /// Loads a JSON array of profiles. Any invalid or duplicate entry rejects the whole file.
    pub fn load_from_json_file(path: impl AsRef<Path>) -> Result<Self, StorageError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|e| StorageError::Unavailable {
            table: TABLE,
            detail: format!("{}: {e}", path.display()),
        })?;
        Self::load_from_json_str(&raw)
    }

    pub fn load_from_json_str(raw: &str) -> Result<Self, StorageError> {
        let profiles: Vec<UserProfile> =
            serde_json::from_str(raw).map_err(|e| StorageError::Unavailable {
                table: TABLE,
                detail: format!("invalid users json: {e}"),
            })?;
        let mut store = Self::new_in_memory();
        for p in profiles {
            store.insert_user(p)?;
        }
        Ok(store)
    }
}

impl UserRepo for UserStore {
    fn user(&self, id: &UserId) -> Option<&UserProfile> {
        self.users.get(id)
    }

    fn insert_user(&mut self, user: UserProfile) -> Result<(), StorageError> {
        user.validate()?;
        if self.users.contains_key(&user.id) {
            return Err(StorageError::DuplicateKey {
                table: TABLE,
                key: user.id.to_string(),
            });
        }
        self.users.insert(user.id.clone(), user);
        Ok(())
    }

    fn user_count(&self) -> usize {
        self.users.len()
    }
}
