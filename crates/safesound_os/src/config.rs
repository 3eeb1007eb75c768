#![forbid(unsafe_code)]

use std::env;
use std::path::PathBuf;
use std::time::Duration;

use safesound_engines::classifier::{DEFAULT_CLASSIFIER_URL, DEFAULT_CLASSIFY_TIMEOUT};
use safesound_engines::gate::{DangerLexicon, GateConfig, DEFAULT_THRESHOLD};
use safesound_engines::voice::{DEFAULT_COUNTRY_PREFIX, DEFAULT_TWILIO_API_BASE};

pub const DEFAULT_ALERT_COOLDOWN_SECS: u64 = 30;
pub const MAX_ALERT_COOLDOWN_SECS: u64 = 3_600;
pub const DEFAULT_DISPATCH_TIMEOUT: Duration = Duration::from_millis(15_000);
pub const DEFAULT_MAX_CONCURRENT_FANOUTS: usize = 8;
pub const DEFAULT_EMAIL_FROM: &str = "alerts@safesound.local";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmailChannelConfig {
    pub relay_url: String,
    pub api_key: String,
    pub from: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VoiceChannelConfig {
    pub account_sid: String,
    pub auth_token: String,
    pub from_number: String,
    pub api_base: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PipelineConfig {
    pub users_file: Option<PathBuf>,
    pub classifier_url: String,
    pub classifier_timeout: Duration,
    pub gate: GateConfig,
    /// 0 disables repeat suppression.
    pub alert_cooldown_secs: u64,
    pub dispatch_timeout: Duration,
    pub max_concurrent_fanouts: usize,
    pub default_country_prefix: String,
    pub email: Option<EmailChannelConfig>,
    pub voice: Option<VoiceChannelConfig>,
}

impl PipelineConfig {
    pub fn mvp_v1() -> Self {
        Self {
            users_file: None,
            classifier_url: DEFAULT_CLASSIFIER_URL.to_string(),
            classifier_timeout: DEFAULT_CLASSIFY_TIMEOUT,
            gate: GateConfig::mvp_v1(),
            alert_cooldown_secs: DEFAULT_ALERT_COOLDOWN_SECS,
            dispatch_timeout: DEFAULT_DISPATCH_TIMEOUT,
            max_concurrent_fanouts: DEFAULT_MAX_CONCURRENT_FANOUTS,
            default_country_prefix: DEFAULT_COUNTRY_PREFIX.to_string(),
            email: None,
            voice: None,
        }
    }

    pub fn from_env() -> Self {
        Self::from_env_var_map(|key| env::var(key).ok())
    }

    /// Unset, unparsable or out-of-range values fall back to the `mvp_v1` defaults.
    pub fn from_env_var_map<F>(mut env_getter: F) -> Self
    where
        F: FnMut(&str) -> Option<String>,
    {
        let mut get = |key: &str| {
            env_getter(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };
        let defaults = Self::mvp_v1();

        let threshold = get("SAFESOUND_GATE_THRESHOLD")
            .and_then(|v| v.parse::<f64>().ok())
            .filter(|v| v.is_finite() && (0.0..=100.0).contains(v))
            .unwrap_or(DEFAULT_THRESHOLD);
        let lexicon = match get("SAFESOUND_DANGER_LEXICON") {
            Some(csv) => DangerLexicon::parse_csv(&csv).unwrap_or_else(|err| {
                tracing::warn!(error = %err, "SAFESOUND_DANGER_LEXICON ignored; using built-in lexicon");
                DangerLexicon::default_v1()
            }),
            None => DangerLexicon::default_v1(),
        };

        let email = match (
            get("SAFESOUND_EMAIL_RELAY_URL"),
            get("SAFESOUND_EMAIL_API_KEY"),
        ) {
            (Some(relay_url), Some(api_key)) => Some(EmailChannelConfig {
                relay_url,
                api_key,
                from: get("SAFESOUND_EMAIL_FROM").unwrap_or_else(|| DEFAULT_EMAIL_FROM.to_string()),
            }),
            _ => None,
        };

        let voice = match (
            get("TWILIO_ACCOUNT_SID"),
            get("TWILIO_AUTH_TOKEN"),
            get("TWILIO_FROM_NUMBER"),
        ) {
            (Some(account_sid), Some(auth_token), Some(from_number)) => Some(VoiceChannelConfig {
                account_sid,
                auth_token,
                from_number,
                api_base: get("TWILIO_API_BASE")
                    .unwrap_or_else(|| DEFAULT_TWILIO_API_BASE.to_string()),
            }),
            _ => None,
        };

        Self {
            users_file: get("SAFESOUND_USERS_FILE").map(PathBuf::from),
            classifier_url: get("SAFESOUND_CLASSIFIER_URL").unwrap_or(defaults.classifier_url),
            classifier_timeout: get("SAFESOUND_CLASSIFIER_TIMEOUT_MS")
                .and_then(|v| v.parse::<u64>().ok())
                .filter(|v| (1_000..=60_000).contains(v))
                .map(Duration::from_millis)
                .unwrap_or(defaults.classifier_timeout),
            gate: GateConfig { threshold, lexicon },
            alert_cooldown_secs: get("SAFESOUND_ALERT_COOLDOWN_SECS")
                .and_then(|v| v.parse::<u64>().ok())
                .filter(|v| *v <= MAX_ALERT_COOLDOWN_SECS)
                .unwrap_or(defaults.alert_cooldown_secs),
            dispatch_timeout: get("SAFESOUND_DISPATCH_TIMEOUT_MS")
                .and_then(|v| v.parse::<u64>().ok())
                .filter(|v| (1_000..=30_000).contains(v))
                .map(Duration::from_millis)
                .unwrap_or(defaults.dispatch_timeout),
            max_concurrent_fanouts: get("SAFESOUND_MAX_CONCURRENT_FANOUTS")
                .and_then(|v| v.parse::<usize>().ok())
                .filter(|v| (1..=256).contains(v))
                .unwrap_or(defaults.max_concurrent_fanouts),
            default_country_prefix: get("SAFESOUND_DEFAULT_COUNTRY_PREFIX")
                .filter(|v| is_country_prefix(v))
                .unwrap_or(defaults.default_country_prefix),
            email,
            voice,
        }
    }
}

fn is_country_prefix(v: &str) -> bool {
    v.strip_prefix('+')
        .is_some_and(|d| (1..=4).contains(&d.len()) && d.chars().all(|c| c.is_ascii_digit()))
}
