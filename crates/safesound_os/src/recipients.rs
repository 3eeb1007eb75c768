#![forbid(unsafe_code)]

use safesound_contracts::notify::Recipient;
use safesound_contracts::user::{EmergencyContact, UserId, UserProfile, MAX_EMERGENCY_CONTACTS};

use crate::SharedUserRepo;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ResolveError {
    #[error("user {0} not found")]
    UserNotFound(UserId),
    /// Soft: the user is still notified on their own addresses.
    #[error("user {} has no emergency contacts", .user.id)]
    NoEmergencyContacts { user: Box<UserProfile> },
}

#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedRecipients {
    pub user: UserProfile,
    pub contacts: Vec<EmergencyContact>,
}

impl ResolvedRecipients {
    /// The user first, then contacts in stored order.
    pub fn recipients(&self) -> Vec<Recipient> {
        std::iter::once(Recipient::for_user(&self.user))
            .chain(self.contacts.iter().map(Recipient::for_contact))
            .collect()
    }
}

#[derive(Clone)]
pub struct RecipientResolver {
    users: SharedUserRepo,
}

impl RecipientResolver {
    pub fn new(users: SharedUserRepo) -> Self {
        Self { users }
    }

    pub fn resolve(&self, user_id: &UserId) -> Result<ResolvedRecipients, ResolveError> {
        let user = {
            let users = self.users.read();
            users
                .user(user_id)
                .cloned()
                .ok_or_else(|| ResolveError::UserNotFound(user_id.clone()))?
        };
        if user.emergency_contacts.is_empty() {
            return Err(ResolveError::NoEmergencyContacts {
                user: Box::new(user),
            });
        }
        let mut contacts = user.emergency_contacts.clone();
        if contacts.len() > MAX_EMERGENCY_CONTACTS {
            tracing::warn!(
                user_id = %user_id,
                stored = contacts.len(),
                max = MAX_EMERGENCY_CONTACTS,
                "contact list over bound; extra contacts ignored"
            );
            contacts.truncate(MAX_EMERGENCY_CONTACTS);
        }
        Ok(ResolvedRecipients { user, contacts })
    }
}
