/// Where a query is answered, resolved fresh for every dispatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchMode {
    /// Local simulation only; the network is never touched.
    ForceLocal,
    /// The runtime toggle explicitly asks for the remote orchestrator.
    ForceRemote,
    /// No toggle says otherwise; try the remote orchestrator.
    Default,
}

impl DispatchMode {
    /// Ordered lookup: runtime toggle, then environment default, then remote.
    ///
    /// A runtime `false` wins over an environment default of `true`; the two
    /// flags are not ORed together.
    pub fn resolve(runtime_toggle: Option<bool>, env_default: bool) -> Self {
        match runtime_toggle {
            Some(true) => DispatchMode::ForceLocal,
            Some(false) => DispatchMode::ForceRemote,
            None if env_default => DispatchMode::ForceLocal,
            None => DispatchMode::Default,
        }
    }

    pub fn uses_remote(&self) -> bool {
        !matches!(self, DispatchMode::ForceLocal)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            DispatchMode::ForceLocal => "force-local",
            DispatchMode::ForceRemote => "force-remote",
            DispatchMode::Default => "default",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            DispatchMode::ForceLocal => "Local simulation",
            DispatchMode::ForceRemote => "Remote orchestrator",
            DispatchMode::Default => "Remote orchestrator (default)",
        }
    }
}

/// Parse a stored toggle value. Only the exact strings `"true"` and `"false"` count.
pub fn parse_flag(value: &str) -> Option<bool> {
    match value {
        "true" => Some(true),
        "false" => Some(false),
        _ => None,
    }
}
