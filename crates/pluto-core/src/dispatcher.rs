//! Per-request choice between the remote orchestrator and local simulation.

use std::sync::Arc;

use tracing::{debug, warn};

use crate::config::Config;
use crate::error::{ClientError, PreferenceError};
use crate::fallback::FallbackResponder;
use crate::mode::{parse_flag, DispatchMode};
use crate::preferences::{PreferenceStore, USE_MOCK_SERVER_KEY};
use crate::remote::RemoteQueryClient;
use crate::transport::HttpTransport;

/// Why a reply was simulated instead of fetched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FallbackReason {
    /// The resolved mode said local.
    Configured,
    /// The remote call never produced a response.
    Transport,
    /// The remote answered with an error status or an undecodable body.
    Shape,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplySource {
    Remote,
    Simulated(FallbackReason),
}

/// Outcome of one dispatch.
///
/// `QueryDispatcher` only ever builds `Reply`. `Failed` exists so callers
/// render the whole contract, not because any dispatch path produces it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchResult {
    Reply { text: String, source: ReplySource },
    Failed { error: String },
}

impl DispatchResult {
    pub fn success(&self) -> bool {
        matches!(self, DispatchResult::Reply { .. })
    }

    pub fn reply(&self) -> Option<&str> {
        match self {
            DispatchResult::Reply { text, .. } => Some(text),
            DispatchResult::Failed { .. } => None,
        }
    }

    pub fn error(&self) -> Option<&str> {
        match self {
            DispatchResult::Reply { .. } => None,
            DispatchResult::Failed { error } => Some(error),
        }
    }

    pub fn source(&self) -> Option<ReplySource> {
        match self {
            DispatchResult::Reply { source, .. } => Some(*source),
            DispatchResult::Failed { .. } => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct QueryDispatcher {
    base_url: String,
    use_mock_default: bool,
    preferences: Arc<dyn PreferenceStore>,
    remote: RemoteQueryClient,
    fallback: FallbackResponder,
}

impl QueryDispatcher {
    pub fn new(
        config: &Config,
        transport: Arc<dyn HttpTransport>,
        preferences: Arc<dyn PreferenceStore>,
    ) -> Self {
        Self {
            base_url: config.orchestrator_url.clone(),
            use_mock_default: config.use_mock_default,
            preferences,
            remote: RemoteQueryClient::new(transport),
            fallback: FallbackResponder::new(),
        }
    }

    pub fn with_fallback(mut self, fallback: FallbackResponder) -> Self {
        self.fallback = fallback;
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Read the runtime toggle now and combine it with the environment default.
    pub fn resolve_mode(&self) -> DispatchMode {
        let runtime = self
            .preferences
            .get(USE_MOCK_SERVER_KEY)
            .as_deref()
            .and_then(parse_flag);
        DispatchMode::resolve(runtime, self.use_mock_default)
    }

    /// Persist the runtime toggle.
    pub fn set_use_mock(&self, enabled: bool) -> Result<(), PreferenceError> {
        let value = if enabled { "true" } else { "false" };
        self.preferences.set(USE_MOCK_SERVER_KEY, value)
    }

    /// Answer `text`. Every path yields a reply.
    pub async fn dispatch(&self, text: &str) -> DispatchResult {
        let mode = self.resolve_mode();
        debug!(mode = mode.as_str(), "dispatching query");

        if !mode.uses_remote() {
            return self.simulate(text, FallbackReason::Configured).await;
        }

        match self.remote.query(&self.base_url, text).await {
            Ok(reply) => DispatchResult::Reply {
                text: reply,
                source: ReplySource::Remote,
            },
            Err(err) => {
                let reason = match err {
                    ClientError::Transport(_) => FallbackReason::Transport,
                    ClientError::Shape(_) => FallbackReason::Shape,
                };
                warn!(
                    base_url = %self.base_url,
                    error = %err,
                    "remote query failed, answering with local simulation"
                );
                self.simulate(text, reason).await
            }
        }
    }

    async fn simulate(&self, text: &str, reason: FallbackReason) -> DispatchResult {
        DispatchResult::Reply {
            text: self.fallback.simulate(text).await,
            source: ReplySource::Simulated(reason),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::TransportError;
    use crate::fallback::{echo_reply, NEWS_DIGEST};
    use crate::preferences::MemoryPreferences;
    use crate::transport::testing::ScriptedTransport;
    use regex::Regex;
    use std::time::Duration;

    fn dispatcher(
        transport: Arc<ScriptedTransport>,
        preferences: MemoryPreferences,
        use_mock_default: bool,
    ) -> QueryDispatcher {
        let config = Config {
            orchestrator_url: "http://orch.test".to_string(),
            use_mock_default,
            ..Config::default()
        };
        QueryDispatcher::new(&config, transport, Arc::new(preferences))
            .with_fallback(FallbackResponder::instant())
    }

    #[tokio::test]
    async fn test_runtime_toggle_skips_network_regardless_of_default() {
        for default in [false, true] {
            let transport = Arc::new(ScriptedTransport::always(200, r#"{"reply":"remote"}"#));
            let prefs = MemoryPreferences::with(USE_MOCK_SERVER_KEY, "true");
            let dispatcher = dispatcher(transport.clone(), prefs, default);

            let result = dispatcher.dispatch("hello").await;

            assert_eq!(transport.call_count(), 0);
            assert_eq!(
                result.source(),
                Some(ReplySource::Simulated(FallbackReason::Configured))
            );
            assert_eq!(result.reply(), Some(echo_reply("hello").as_str()));
        }
    }

    #[tokio::test]
    async fn test_forced_mock_ethereum_price_scenario() {
        let transport = Arc::new(ScriptedTransport::always(200, r#"{"reply":"remote"}"#));
        let prefs = MemoryPreferences::with(USE_MOCK_SERVER_KEY, "true");
        let dispatcher = dispatcher(transport.clone(), prefs, false);

        let result = dispatcher.dispatch("What's the price of Ethereum?").await;

        assert!(result.success());
        assert_eq!(transport.call_count(), 0);
        let re = Regex::new(r"^Harga Ethereum saat ini adalah \$(\d+) USD\.$").unwrap();
        let caps = re.captures(result.reply().unwrap()).unwrap();
        let price: u64 = caps[1].parse().unwrap();
        assert!((1620..=1980).contains(&price));
    }

    #[tokio::test]
    async fn test_env_default_applies_when_toggle_absent() {
        let transport = Arc::new(ScriptedTransport::always(200, r#"{"reply":"remote"}"#));
        let dispatcher = dispatcher(transport.clone(), MemoryPreferences::new(), true);

        let result = dispatcher.dispatch("news please").await;

        assert_eq!(transport.call_count(), 0);
        assert_eq!(result.reply(), Some(NEWS_DIGEST));
    }

    #[tokio::test]
    async fn test_runtime_false_overrides_env_default() {
        let transport = Arc::new(ScriptedTransport::always(200, r#"{"reply":"remote"}"#));
        let prefs = MemoryPreferences::with(USE_MOCK_SERVER_KEY, "false");
        let dispatcher = dispatcher(transport.clone(), prefs, true);

        assert_eq!(dispatcher.resolve_mode(), DispatchMode::ForceRemote);
        let result = dispatcher.dispatch("hello").await;

        assert_eq!(transport.call_count(), 1);
        assert_eq!(result.reply(), Some("remote"));
        assert_eq!(result.source(), Some(ReplySource::Remote));
    }

    #[tokio::test]
    async fn test_unrecognized_toggle_value_is_absent() {
        let transport = Arc::new(ScriptedTransport::always(200, r#"{"result":"r"}"#));
        let prefs = MemoryPreferences::with(USE_MOCK_SERVER_KEY, "yes");
        let dispatcher = dispatcher(transport.clone(), prefs, false);

        assert_eq!(dispatcher.resolve_mode(), DispatchMode::Default);
        assert_eq!(dispatcher.dispatch("hello").await.reply(), Some("r"));
    }

    #[tokio::test]
    async fn test_toggle_is_read_on_every_call() {
        let transport = Arc::new(ScriptedTransport::always(200, r#"{"reply":"remote"}"#));
        let dispatcher = dispatcher(transport.clone(), MemoryPreferences::new(), false);

        assert_eq!(dispatcher.dispatch("a").await.reply(), Some("remote"));
        dispatcher.set_use_mock(true).unwrap();
        assert_eq!(
            dispatcher.dispatch("a").await.source(),
            Some(ReplySource::Simulated(FallbackReason::Configured))
        );
        dispatcher.set_use_mock(false).unwrap();
        assert_eq!(dispatcher.dispatch("a").await.reply(), Some("remote"));
        assert_eq!(transport.call_count(), 2);
    }

    #[tokio::test]
    async fn test_connection_refused_still_succeeds() {
        let transport = Arc::new(ScriptedTransport::refusing());
        let dispatcher = dispatcher(transport.clone(), MemoryPreferences::new(), false);

        let result = dispatcher.dispatch("What's the price of Ethereum?").await;

        assert!(result.success());
        assert_eq!(result.error(), None);
        assert_eq!(
            result.source(),
            Some(ReplySource::Simulated(FallbackReason::Transport))
        );
        let re = Regex::new(r"^Harga Ethereum saat ini adalah \$(\d+) USD\.$").unwrap();
        assert!(re.is_match(result.reply().unwrap()));
        assert_eq!(transport.call_count(), 1);
    }

    #[tokio::test]
    async fn test_every_transport_failure_kind_falls_back() {
        let failures: Vec<fn(&str) -> TransportError> = vec![
            |url| TransportError::Timeout { url: url.to_string() },
            |url| TransportError::ConnectionFailed {
                url: url.to_string(),
                message: "dns failure".to_string(),
            },
            |_| TransportError::Request("relative URL without a base".to_string()),
        ];

        for failure in failures {
            let transport = Arc::new(ScriptedTransport::new(move |_, request| {
                (Duration::ZERO, Err(failure(&request.url)))
            }));
            let dispatcher = dispatcher(transport, MemoryPreferences::new(), false);
            let result = dispatcher.dispatch("hi").await;
            assert!(result.success());
            assert_eq!(
                result.source(),
                Some(ReplySource::Simulated(FallbackReason::Transport))
            );
        }
    }

    #[tokio::test]
    async fn test_error_status_and_bad_body_fall_back() {
        for (status, body) in [(500, r#"{"reply":"boom"}"#), (404, ""), (200, "<html>")] {
            let transport = Arc::new(ScriptedTransport::always(status, body));
            let dispatcher = dispatcher(transport, MemoryPreferences::new(), false);
            let result = dispatcher.dispatch("hello").await;
            assert_eq!(
                result,
                DispatchResult::Reply {
                    text: echo_reply("hello"),
                    source: ReplySource::Simulated(FallbackReason::Shape),
                }
            );
        }
    }

    #[tokio::test]
    async fn test_unknown_payload_is_shown_verbatim() {
        let transport = Arc::new(ScriptedTransport::always(200, r#"{"error":"storage send failed"}"#));
        let dispatcher = dispatcher(transport, MemoryPreferences::new(), false);

        let result = dispatcher.dispatch("hello").await;
        assert_eq!(result.reply(), Some(r#"{"error":"storage send failed"}"#));
        assert_eq!(result.source(), Some(ReplySource::Remote));
    }

    #[tokio::test(start_paused = true)]
    async fn test_remote_attempt_precedes_fallback() {
        let transport = Arc::new(ScriptedTransport::new(|_, request| {
            (
                Duration::from_millis(250),
                Err(TransportError::Timeout {
                    url: request.url.clone(),
                }),
            )
        }));
        let config = Config {
            orchestrator_url: "http://orch.test".to_string(),
            ..Config::default()
        };
        let dispatcher = QueryDispatcher::new(
            &config,
            transport.clone(),
            Arc::new(MemoryPreferences::new()),
        )
        .with_fallback(FallbackResponder::with_latency(
            Duration::from_millis(400)..Duration::from_millis(401),
        ));

        let started = tokio::time::Instant::now();
        let result = dispatcher.dispatch("hi").await;

        assert!(started.elapsed() >= Duration::from_millis(650));
        assert!(result.success());
    }

    #[test]
    fn test_failed_variant_accessors() {
        let failed = DispatchResult::Failed {
            error: "unreachable".to_string(),
        };
        assert!(!failed.success());
        assert_eq!(failed.reply(), None);
        assert_eq!(failed.error(), Some("unreachable"));
        assert_eq!(failed.source(), None);
    }
}
