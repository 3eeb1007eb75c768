#![forbid(unsafe_code)]

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use safesound_contracts::alert::AlertId;
use safesound_contracts::notify::{AlertNotice, ChannelKind, Recipient};
use safesound_engines::email::{EmailChannel, HttpEmailRelay, HttpEmailRelayConfig};
use safesound_engines::message::RenderedMessage;
use safesound_engines::transport::TransportError;
use safesound_engines::voice::{TwilioConfig, TwilioTransport, VoiceCallChannel};

use crate::config::PipelineConfig;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ChannelDispatchError {
    #[error("{channel} attempt timed out after {timeout_ms}ms")]
    Timeout { channel: ChannelKind, timeout_ms: u64 },
    #[error(transparent)]
    Transport(#[from] TransportError),
    #[error("{channel} worker failed: {detail}")]
    Worker { channel: ChannelKind, detail: String },
}

/// One scheduled send: a rendered message for one recipient on one channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatchAttempt {
    pub alert_id: AlertId,
    pub channel: ChannelKind,
    pub recipient: Recipient,
    pub address: String,
    pub message: RenderedMessage,
    pub idempotency_key: String,
}

#[async_trait]
pub trait ChannelAdapter: Send + Sync {
    fn kind(&self) -> ChannelKind;

    fn render(&self, notice: &AlertNotice, recipient: &Recipient) -> RenderedMessage;

    /// Bounded by the adapter's own per-attempt timeout. Returns the provider id.
    async fn send(&self, attempt: &DispatchAttempt) -> Result<String, ChannelDispatchError>;
}

/// Runs a blocking transport call off the async workers and bounds it.
pub async fn run_blocking_with_timeout<T, F>(
    channel: ChannelKind,
    timeout: Duration,
    f: F,
) -> Result<T, ChannelDispatchError>
where
    T: Send + 'static,
    F: FnOnce() -> Result<T, TransportError> + Send + 'static,
{
    match tokio::time::timeout(timeout, tokio::task::spawn_blocking(f)).await {
        Err(_) => Err(ChannelDispatchError::Timeout {
            channel,
            timeout_ms: timeout.as_millis() as u64,
        }),
        Ok(Err(join_err)) => Err(ChannelDispatchError::Worker {
            channel,
            detail: join_err.to_string(),
        }),
        Ok(Ok(result)) => result.map_err(ChannelDispatchError::from),
    }
}

pub struct EmailChannelAdapter {
    channel: EmailChannel,
    timeout: Duration,
}

impl EmailChannelAdapter {
    pub fn new(channel: EmailChannel, timeout: Duration) -> Self {
        Self { channel, timeout }
    }
}

#[async_trait]
impl ChannelAdapter for EmailChannelAdapter {
    fn kind(&self) -> ChannelKind {
        ChannelKind::Email
    }

    fn render(&self, notice: &AlertNotice, recipient: &Recipient) -> RenderedMessage {
        self.channel.render(notice, recipient.is_self)
    }

    async fn send(&self, attempt: &DispatchAttempt) -> Result<String, ChannelDispatchError> {
        let channel = self.channel.clone();
        let to = attempt.address.clone();
        let message = attempt.message.clone();
        let key = attempt.idempotency_key.clone();
        run_blocking_with_timeout(ChannelKind::Email, self.timeout, move || {
            channel.send(&to, &message, Some(key))
        })
        .await
    }
}

pub struct VoiceCallChannelAdapter {
    channel: VoiceCallChannel,
    timeout: Duration,
}

impl VoiceCallChannelAdapter {
    pub fn new(channel: VoiceCallChannel, timeout: Duration) -> Self {
        Self { channel, timeout }
    }
}

#[async_trait]
impl ChannelAdapter for VoiceCallChannelAdapter {
    fn kind(&self) -> ChannelKind {
        ChannelKind::Call
    }

    fn render(&self, notice: &AlertNotice, recipient: &Recipient) -> RenderedMessage {
        self.channel.render(notice, recipient.is_self)
    }

    async fn send(&self, attempt: &DispatchAttempt) -> Result<String, ChannelDispatchError> {
        let channel = self.channel.clone();
        let to = attempt.address.clone();
        let message = attempt.message.clone();
        run_blocking_with_timeout(ChannelKind::Call, self.timeout, move || {
            channel.send(&to, &message)
        })
        .await
    }
}

/// Configured adapters. An absent adapter means the channel is not configured.
#[derive(Clone, Default)]
pub struct ChannelSet {
    pub email: Option<Arc<dyn ChannelAdapter>>,
    pub call: Option<Arc<dyn ChannelAdapter>>,
}

impl ChannelSet {
    pub fn new(
        email: Option<Arc<dyn ChannelAdapter>>,
        call: Option<Arc<dyn ChannelAdapter>>,
    ) -> Self {
        Self { email, call }
    }

    /// Builds the HTTP-backed adapters for every channel with credentials.
    pub fn from_config(config: &PipelineConfig) -> Self {
        let email = config.email.as_ref().map(|c| {
            let relay = HttpEmailRelay::new(HttpEmailRelayConfig {
                endpoint: c.relay_url.clone(),
                api_key: c.api_key.clone(),
                from: c.from.clone(),
                timeout: config.dispatch_timeout,
            });
            let channel = EmailChannel::new(Arc::new(relay), &c.from);
            Arc::new(EmailChannelAdapter::new(channel, config.dispatch_timeout))
                as Arc<dyn ChannelAdapter>
        });
        let call = config.voice.as_ref().map(|c| {
            let transport = TwilioTransport::new(TwilioConfig {
                account_sid: c.account_sid.clone(),
                auth_token: c.auth_token.clone(),
                api_base: c.api_base.clone(),
                timeout: config.dispatch_timeout,
            });
            let channel = VoiceCallChannel::new(
                Arc::new(transport),
                c.from_number.clone(),
                config.default_country_prefix.clone(),
            );
            Arc::new(VoiceCallChannelAdapter::new(channel, config.dispatch_timeout))
                as Arc<dyn ChannelAdapter>
        });
        let set = Self { email, call };
        for kind in set.not_configured() {
            tracing::warn!(channel = %kind, "notification channel not configured; it will be skipped");
        }
        set
    }

    pub fn configured(&self) -> Vec<Arc<dyn ChannelAdapter>> {
        self.email.iter().chain(self.call.iter()).cloned().collect()
    }

    pub fn not_configured(&self) -> Vec<ChannelKind> {
        let mut out = Vec::new();
        if self.email.is_none() {
            out.push(ChannelKind::Email);
        }
        if self.call.is_none() {
            out.push(ChannelKind::Call);
        }
        out
    }

    pub fn is_configured(&self, kind: ChannelKind) -> bool {
        match kind {
            ChannelKind::Email => self.email.is_some(),
            ChannelKind::Call => self.call.is_some(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{EmailChannelConfig, VoiceChannelConfig};

    #[tokio::test]
    async fn at_channels_01_hung_transport_bounded_by_timeout() {
        let started = std::time::Instant::now();
        let r: Result<String, _> =
            run_blocking_with_timeout(ChannelKind::Email, Duration::from_millis(50), || {
                std::thread::sleep(Duration::from_millis(400));
                Ok("late".to_string())
            })
            .await;
        assert!(matches!(
            r,
            Err(ChannelDispatchError::Timeout {
                channel: ChannelKind::Email,
                timeout_ms: 50
            })
        ));
        assert!(started.elapsed() < Duration::from_millis(350));
    }

    #[tokio::test]
    async fn at_channels_02_transport_error_passes_through() {
        let r: Result<String, _> =
            run_blocking_with_timeout(ChannelKind::Call, Duration::from_secs(1), || {
                Err(TransportError::HttpStatus {
                    provider: "twilio",
                    status: 401,
                })
            })
            .await;
        assert_eq!(
            r.unwrap_err().to_string(),
            "twilio returned http 401"
        );
    }

    #[tokio::test]
    async fn at_channels_03_panicking_transport_is_worker_error() {
        let r: Result<String, _> =
            run_blocking_with_timeout(ChannelKind::Call, Duration::from_secs(1), || {
                panic!("transport bug")
            })
            .await;
        assert!(matches!(r, Err(ChannelDispatchError::Worker { .. })));
    }

    #[test]
    fn at_channels_04_set_reflects_credentials() {
        let none = ChannelSet::from_config(&PipelineConfig::mvp_v1());
        assert!(none.configured().is_empty());
        assert_eq!(none.not_configured(), vec![ChannelKind::Email, ChannelKind::Call]);

        let mut cfg = PipelineConfig::mvp_v1();
        cfg.email = Some(EmailChannelConfig {
            relay_url: "https://relay.test/send".to_string(),
            api_key: "k".to_string(),
            from: "alerts@safesound.test".to_string(),
        });
        cfg.voice = Some(VoiceChannelConfig {
            account_sid: "AC1".to_string(),
            auth_token: "t".to_string(),
            from_number: "+15550001111".to_string(),
            api_base: "https://api.twilio.com".to_string(),
        });
        let both = ChannelSet::from_config(&cfg);
        let kinds: Vec<ChannelKind> = both.configured().iter().map(|a| a.kind()).collect();
        assert_eq!(kinds, vec![ChannelKind::Email, ChannelKind::Call]);
        assert!(both.not_configured().is_empty());
    }
}
