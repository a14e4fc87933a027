//! Process configuration resolved once from the environment.

pub const DEFAULT_ORCHESTRATOR_URL: &str = "http://localhost:8001";

pub const ORCHESTRATOR_URL_VAR: &str = "PLUTO_ORCHESTRATOR_URL";
pub const SCHEDULER_URL_VAR: &str = "PLUTO_SCHEDULER_URL";
pub const USE_MOCK_VAR: &str = "PLUTO_USE_MOCK";
pub const SCHEDULER_TOKEN_VAR: &str = "PLUTO_SCHEDULER_TOKEN";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Base address of the remote orchestrator (`{base}/query`).
    pub orchestrator_url: String,
    /// Base address of the remote scheduler (`{base}/schedule/...`).
    pub scheduler_url: String,
    /// Build/environment default for "use local simulation".
    pub use_mock_default: bool,
    pub scheduler_token: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            orchestrator_url: DEFAULT_ORCHESTRATOR_URL.to_string(),
            scheduler_url: DEFAULT_ORCHESTRATOR_URL.to_string(),
            use_mock_default: false,
            scheduler_token: None,
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Resolve from an arbitrary variable source.
    ///
    /// Addresses are not validated here; a bad one fails at call time.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let orchestrator_url = non_empty(ORCHESTRATOR_URL_VAR)
            .map(|url| trim_base(&url))
            .unwrap_or_else(|| DEFAULT_ORCHESTRATOR_URL.to_string());

        let scheduler_url = non_empty(SCHEDULER_URL_VAR)
            .map(|url| trim_base(&url))
            .unwrap_or_else(|| orchestrator_url.clone());

        Self {
            orchestrator_url,
            scheduler_url,
            use_mock_default: non_empty(USE_MOCK_VAR).as_deref() == Some("true"),
            scheduler_token: non_empty(SCHEDULER_TOKEN_VAR),
        }
    }
}

fn trim_base(url: &str) -> String {
    url.trim_end_matches('/').to_string()
}
