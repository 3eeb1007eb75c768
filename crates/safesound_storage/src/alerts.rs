#![forbid(unsafe_code)]

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use safesound_contracts::alert::{Alert, AlertCreateInput, AlertId, AlertStatus};
use safesound_contracts::Validate;

use crate::repo::{AlertRepo, AlertTypeStat, StatusCounts, StorageError, MAX_RECENT_LIMIT};

const TABLE: &str = "alerts";

#[derive(Debug, Default)]
pub struct AlertStore {
    alerts: BTreeMap<AlertId, Alert>,
    next_id: u64,
}

impl AlertStore {
    pub fn new_in_memory() -> Self {
        Self {
            alerts: BTreeMap::new(),
            next_id: 1,
        }
    }

    pub fn len(&self) -> usize {
        self.alerts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.alerts.is_empty()
    }
}

impl AlertRepo for AlertStore {
    fn create_alert(
        &mut self,
        input: AlertCreateInput,
        now: DateTime<Utc>,
    ) -> Result<Alert, StorageError> {
        input.validate()?;
        let id = AlertId(self.next_id.max(1));
        if self.alerts.contains_key(&id) {
            return Err(StorageError::DuplicateKey {
                table: TABLE,
                key: id.to_string(),
            });
        }
        let alert = Alert::from_input(id, input, now);
        self.alerts.insert(id, alert.clone());
        self.next_id = id.0 + 1;
        Ok(alert)
    }

    fn alert(&self, id: AlertId) -> Option<&Alert> {
        self.alerts.get(&id)
    }

    fn list_recent(&self, limit: usize) -> Vec<&Alert> {
        // Ids are assigned monotonically, so reverse id order is newest first.
        self.alerts
            .values()
            .rev()
            .take(limit.min(MAX_RECENT_LIMIT))
            .collect()
    }

    fn update_status(
        &mut self,
        id: AlertId,
        target: AlertStatus,
        actor: Option<String>,
        now: DateTime<Utc>,
    ) -> Result<Alert, StorageError> {
        let alert = self.alerts.get_mut(&id).ok_or_else(|| StorageError::NotFound {
            table: TABLE,
            key: id.to_string(),
        })?;
        if !alert.status.can_transition_to(target) {
            return Err(StorageError::InvalidTransition {
                table: TABLE,
                key: id.to_string(),
                from: alert.status,
                to: target,
            });
        }
        alert.status = target;
        if target == AlertStatus::Resolved {
            alert.resolved_at = Some(now);
            alert.resolved_by = actor
                .map(|a| a.trim().to_string())
                .filter(|a| !a.is_empty());
        }
        Ok(alert.clone())
    }

    fn count_by_status(&self) -> StatusCounts {
        let mut out = StatusCounts::default();
        for a in self.alerts.values() {
            match a.status {
                AlertStatus::Active => out.active += 1,
                AlertStatus::Resolved => out.resolved += 1,
                AlertStatus::Dismissed => out.dismissed += 1,
            }
            out.total += 1;
        }
        out
    }

    fn aggregate_by_type(&self) -> Vec<AlertTypeStat> {
        let mut groups: BTreeMap<&str, (u64, u64)> = BTreeMap::new();
        for a in self.alerts.values() {
            let e = groups.entry(a.alert_type.as_str()).or_insert((0, 0));
            e.0 += 1;
            e.1 += u64::from(a.confidence);
        }
        let mut out: Vec<AlertTypeStat> = groups
            .into_iter()
            .map(|(t, (count, sum))| AlertTypeStat {
                alert_type: t.to_string(),
                count,
                average_confidence: ((sum as f64 / count as f64).round() as u64).min(100) as u8,
            })
            .collect();
        // Stable sort keeps the BTreeMap's type order among equal counts.
        out.sort_by(|a, b| b.count.cmp(&a.count));
        out
    }
}
