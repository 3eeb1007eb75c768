#![forbid(unsafe_code)]

use std::path::PathBuf;
use std::sync::Arc;

use chrono::Utc;
use parking_lot::RwLock;
use safesound_contracts::alert::AlertCreateInput;
use safesound_contracts::classification::ClassificationResult;
use safesound_contracts::user::UserId;
use safesound_os::channels::ChannelSet;
use safesound_os::orchestrator::NotificationOrchestrator;
use safesound_os::recipients::RecipientResolver;
use safesound_storage::alerts::AlertStore;
use safesound_storage::repo::{AlertRepo, UserRepo};
use safesound_storage::users::UserStore;
use serde_json::json;

use crate::args::Flags;

pub const DEFAULT_TEST_ALERT_TYPE: &str = "Test Alert - Screaming";
pub const DEFAULT_TEST_CONFIDENCE: f64 = 85.0;
pub const DEFAULT_TEST_LOCATION: &str = "Test Location - Dashboard";

#[derive(Debug, Clone, PartialEq)]
pub struct NotifyTestArgs {
    pub users_file: PathBuf,
    pub user_id: UserId,
    pub alert_type: String,
    pub confidence: f64,
    pub location: String,
}

pub fn parse_notify_test_args(args: &[String]) -> Result<NotifyTestArgs, String> {
    let flags = Flags::parse(
        args,
        &["users-file", "user-id", "type", "confidence", "location"],
        &[],
    )?;
    let user_id = UserId::new(flags.require("user-id")?).map_err(|v| format!("--user-id: {v}"))?;
    Ok(NotifyTestArgs {
        users_file: PathBuf::from(flags.require("users-file")?),
        user_id,
        alert_type: flags.get("type").unwrap_or(DEFAULT_TEST_ALERT_TYPE).to_string(),
        confidence: flags
            .f64_value("confidence")?
            .unwrap_or(DEFAULT_TEST_CONFIDENCE),
        location: flags.get("location").unwrap_or(DEFAULT_TEST_LOCATION).to_string(),
    })
}

/// Runs one awaited fan-out for a user from the users file and returns the
/// dispatch summary as pretty JSON. Nothing is persisted past the call.
pub async fn execute_notify_test(
    args: &NotifyTestArgs,
    channels: ChannelSet,
) -> Result<String, String> {
    let users = UserStore::load_from_json_file(&args.users_file)
        .map_err(|e| format!("failed to load users file: {e}"))?;
    let Some(user) = users.user(&args.user_id) else {
        return Err(format!("user {} not found in users file", args.user_id));
    };
    tracing::info!(
        user_id = %user.id,
        contacts = user.emergency_contacts.len(),
        "sending test notification"
    );

    let result = ClassificationResult::v1(args.alert_type.as_str(), args.confidence, true)
        .map_err(|v| format!("invalid test alert: {v}"))?;
    let input = AlertCreateInput::v1(
        Some(args.user_id.clone()),
        result.label(),
        result.rounded_confidence(),
        Some(args.location.clone()),
    )
    .map_err(|v| format!("invalid test alert: {v}"))?;
    let alert = AlertStore::new_in_memory()
        .create_alert(input, Utc::now())
        .map_err(|e| e.to_string())?;

    let orchestrator = NotificationOrchestrator::new(
        RecipientResolver::new(Arc::new(RwLock::new(users))),
        channels,
    );
    let summary = orchestrator.dispatch(&alert).await;
    let body = json!({
        "alert_id": alert.id.to_string(),
        "severity": alert.severity,
        "summary": summary,
    });
    serde_json::to_string_pretty(&body).map_err(|e| e.to_string())
}
