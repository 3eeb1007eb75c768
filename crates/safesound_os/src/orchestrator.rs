#![forbid(unsafe_code)]

use std::sync::Arc;

use safesound_contracts::alert::Alert;
use safesound_contracts::notify::{
    AlertNotice, ChannelKind, DispatchSummary, NotificationOutcome, REASON_NO_EMERGENCY_CONTACTS,
    REASON_USER_NOT_FOUND,
};
use safesound_engines::transport::attempt_idempotency_key;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::channels::{ChannelAdapter, ChannelSet, DispatchAttempt};
use crate::recipients::{RecipientResolver, ResolveError, ResolvedRecipients};

struct Scheduled {
    channel: ChannelKind,
    address: String,
    is_self: bool,
    handle: JoinHandle<()>,
}

/// Resolves recipients and fans one alert out to every (recipient, channel) pair.
#[derive(Clone)]
pub struct NotificationOrchestrator {
    resolver: RecipientResolver,
    channels: ChannelSet,
}

impl NotificationOrchestrator {
    pub fn new(resolver: RecipientResolver, channels: ChannelSet) -> Self {
        Self { resolver, channels }
    }

    pub fn channels(&self) -> &ChannelSet {
        &self.channels
    }

    /// Never fails: every problem ends up in the returned summary.
    pub async fn dispatch(&self, alert: &Alert) -> DispatchSummary {
        let mut summary = DispatchSummary {
            channels_not_configured: self.channels.not_configured(),
            ..DispatchSummary::default()
        };

        let Some(user_id) = alert.user_id.as_ref() else {
            tracing::warn!(alert_id = %alert.id, "alert has no user; notification skipped");
            summary.reason = Some(REASON_USER_NOT_FOUND.to_string());
            return summary;
        };

        let resolved = match self.resolver.resolve(user_id) {
            Ok(resolved) => resolved,
            Err(ResolveError::UserNotFound(id)) => {
                tracing::warn!(alert_id = %alert.id, user_id = %id, "user not found; notification skipped");
                summary.reason = Some(REASON_USER_NOT_FOUND.to_string());
                return summary;
            }
            Err(ResolveError::NoEmergencyContacts { user }) => {
                tracing::warn!(
                    alert_id = %alert.id,
                    user_id = %user.id,
                    "user has no emergency contacts; notifying user only"
                );
                summary.reason = Some(REASON_NO_EMERGENCY_CONTACTS.to_string());
                ResolvedRecipients {
                    user: *user,
                    contacts: Vec::new(),
                }
            }
        };

        let notice = AlertNotice::new(alert, &resolved.user);
        let adapters = self.channels.configured();
        let (tx, mut rx) = mpsc::unbounded_channel::<NotificationOutcome>();
        let mut scheduled: Vec<Scheduled> = Vec::new();

        for recipient in resolved.recipients() {
            for adapter in &adapters {
                let channel = adapter.kind();
                summary.scheduled_attempts += 1;
                if !recipient.is_self {
                    summary.contact_attempts += 1;
                }
                let Some(address) = recipient.address(channel).map(str::to_string) else {
                    summary.record_skip(NotificationOutcome::failed(
                        channel,
                        recipient.name.clone(),
                        recipient.is_self,
                        missing_address_reason(channel),
                    ));
                    continue;
                };
                let attempt = DispatchAttempt {
                    alert_id: alert.id,
                    channel,
                    message: adapter.render(&notice, &recipient),
                    idempotency_key: attempt_idempotency_key(alert.id, channel, &address),
                    address: address.clone(),
                    recipient: recipient.clone(),
                };
                let handle = spawn_attempt(Arc::clone(adapter), attempt, tx.clone());
                scheduled.push(Scheduled {
                    channel,
                    address,
                    is_self: recipient.is_self,
                    handle,
                });
            }
        }
        drop(tx);

        for s in scheduled {
            if let Err(join_err) = s.handle.await {
                tracing::error!(
                    alert_id = %alert.id,
                    channel = %s.channel,
                    recipient = %s.address,
                    error = %join_err,
                    "dispatch task panicked"
                );
                summary.record(NotificationOutcome::failed(
                    s.channel,
                    s.address,
                    s.is_self,
                    format!("dispatch task failed: {join_err}"),
                ));
            }
        }
        while let Some(outcome) = rx.recv().await {
            summary.record(outcome);
        }

        tracing::info!(
            alert_id = %alert.id,
            scheduled = summary.scheduled_attempts,
            email_ok = summary.email_success_count,
            call_ok = summary.call_success_count,
            failed = summary.errors.len(),
            skipped = summary.skipped_count,
            reason = summary.reason.as_deref().unwrap_or(""),
            "notification fan-out settled"
        );
        summary
    }
}

fn missing_address_reason(channel: ChannelKind) -> &'static str {
    match channel {
        ChannelKind::Email => "no email address",
        ChannelKind::Call => "no phone number",
    }
}

fn spawn_attempt(
    adapter: Arc<dyn ChannelAdapter>,
    attempt: DispatchAttempt,
    tx: mpsc::UnboundedSender<NotificationOutcome>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let outcome = match adapter.send(&attempt).await {
            Ok(provider_id) => {
                tracing::debug!(
                    alert_id = %attempt.alert_id,
                    channel = %attempt.channel,
                    recipient = %attempt.address,
                    provider_id = %provider_id,
                    "notification delivered"
                );
                NotificationOutcome::delivered(
                    attempt.channel,
                    attempt.address.clone(),
                    attempt.recipient.is_self,
                )
            }
            Err(err) => {
                tracing::warn!(
                    alert_id = %attempt.alert_id,
                    channel = %attempt.channel,
                    recipient = %attempt.address,
                    reason = %err,
                    "notification attempt failed"
                );
                NotificationOutcome::failed(
                    attempt.channel,
                    attempt.address.clone(),
                    attempt.recipient.is_self,
                    err.to_string(),
                )
            }
        };
        // The receiver outlives every sender; a send error cannot happen here.
        let _ = tx.send(outcome);
    })
}
