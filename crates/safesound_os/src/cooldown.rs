#![forbid(unsafe_code)]

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use safesound_contracts::user::UserId;

use crate::config::MAX_ALERT_COOLDOWN_SECS;

const PRUNE_ABOVE_ENTRIES: usize = 1_024;

/// Repeat suppression per (user, normalized alert type).
#[derive(Debug)]
pub struct AlertCooldown {
    window: chrono::Duration,
    last_fired: Mutex<HashMap<(UserId, String), DateTime<Utc>>>,
}

impl AlertCooldown {
    pub fn new(window_secs: u64) -> Self {
        let secs = window_secs.min(MAX_ALERT_COOLDOWN_SECS) as i64;
        Self {
            window: chrono::Duration::seconds(secs),
            last_fired: Mutex::new(HashMap::new()),
        }
    }

    pub fn disabled() -> Self {
        Self::new(0)
    }

    pub fn is_enabled(&self) -> bool {
        self.window > chrono::Duration::zero()
    }

    /// Returns false when a previous alert for the same key is still inside the window.
    /// Otherwise records `now` and returns true.
    pub fn try_arm(&self, user_id: &UserId, normalized_type: &str, now: DateTime<Utc>) -> bool {
        if !self.is_enabled() {
            return true;
        }
        let key = (user_id.clone(), normalized_type.to_string());
        let mut last = self.last_fired.lock();
        if let Some(prev) = last.get(&key) {
            if now.signed_duration_since(*prev) < self.window {
                return false;
            }
        }
        last.insert(key, now);
        if last.len() > PRUNE_ABOVE_ENTRIES {
            let window = self.window;
            last.retain(|_, t| now.signed_duration_since(*t) < window);
        }
        true
    }

    /// Forgets the key, e.g. when the alert it was armed for never got persisted.
    pub fn disarm(&self, user_id: &UserId, normalized_type: &str) {
        self.last_fired
            .lock()
            .remove(&(user_id.clone(), normalized_type.to_string()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn t(secs: i64) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 1, 8, 0, 0).unwrap() + chrono::Duration::seconds(secs)
    }

    fn u(id: &str) -> UserId {
        UserId::new(id).unwrap()
    }

    #[test]
    fn at_cooldown_01_repeat_within_window_suppressed() {
        let c = AlertCooldown::new(30);
        assert!(c.try_arm(&u("u1"), "scream", t(0)));
        assert!(!c.try_arm(&u("u1"), "scream", t(29)));
        assert!(c.try_arm(&u("u1"), "scream", t(30)));
    }

    #[test]
    fn at_cooldown_02_keys_are_independent() {
        let c = AlertCooldown::new(30);
        assert!(c.try_arm(&u("u1"), "scream", t(0)));
        assert!(c.try_arm(&u("u1"), "glass breaking", t(1)));
        assert!(c.try_arm(&u("u2"), "scream", t(2)));
    }

    #[test]
    fn at_cooldown_03_zero_window_disables() {
        let c = AlertCooldown::disabled();
        assert!(!c.is_enabled());
        for s in 0..5 {
            assert!(c.try_arm(&u("u1"), "scream", t(s)));
        }
    }

    #[test]
    fn at_cooldown_04_disarm_releases_key() {
        let c = AlertCooldown::new(30);
        assert!(c.try_arm(&u("u1"), "scream", t(0)));
        c.disarm(&u("u1"), "scream");
        assert!(c.try_arm(&u("u1"), "scream", t(1)));
    }
}
