//! Node configuration from the environment.
//!
//! Every value has a default; malformed values are logged and replaced by the
//! default instead of aborting startup.

use std::net::SocketAddr;
use std::str::FromStr;

use liaison_delivery::DeliveryConfig;
use tracing::warn;

use crate::error::Error;

/// Failure line pushed when no parser accepts a fact.
pub const USER_FAILURE: &str = "❌ Error: ParserAgent unavailable. The fact was not processed.";

/// Failure line pushed when no parser accepts a query.
pub const QUERY_FAILURE: &str = "❌ Error: ParserAgent unavailable. Please try again later.";

/// Failure line pushed when no logic agent accepts a formula.
pub const PARSER_FAILURE: &str = "❌ Error: LogicAgent unavailable. Cannot complete the request.";

/// Capability an agent advertises in the directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Role {
    /// Fact intake.
    User,
    /// Query intake.
    Query,
    /// Natural language to logic translation.
    Parser,
    /// Assertion and query evaluation.
    Logic,
    /// Membership reconciliation and event forwarding.
    Monitor,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Query => "query",
            Self::Parser => "parser",
            Self::Logic => "logic",
            Self::Monitor => "monitor",
        }
    }

    /// Role this agent hands its payloads to, with the delivery policy to use.
    pub fn downstream(self) -> Option<(Role, DeliveryConfig)> {
        match self {
            // Facts go out without a pre-send probe.
            Self::User => Some((
                Self::Parser,
                DeliveryConfig::default()
                    .with_probe_gate(false)
                    .with_failure_message(USER_FAILURE),
            )),
            Self::Query => Some((
                Self::Parser,
                DeliveryConfig::default().with_failure_message(QUERY_FAILURE),
            )),
            Self::Parser => Some((
                Self::Logic,
                DeliveryConfig::default().with_failure_message(PARSER_FAILURE),
            )),
            Self::Logic | Self::Monitor => None,
        }
    }

    /// Intake listener address and acknowledgement line, for intake roles.
    pub fn intake(self) -> Option<(&'static str, &'static str)> {
        match self {
            Self::User => Some(("127.0.0.1:5000", "✅ Fact received.")),
            Self::Query => Some(("0.0.0.0:5001", "✅ Query received.")),
            _ => None,
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for Role {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "user" => Ok(Self::User),
            "query" => Ok(Self::Query),
            "parser" => Ok(Self::Parser),
            "logic" => Ok(Self::Logic),
            "monitor" => Ok(Self::Monitor),
            other => Err(Error::Config(format!("unknown role: {}", other))),
        }
    }
}

/// Configuration for one agent node.
#[derive(Debug, Clone)]
pub struct NodeConfig {
    /// Globally unique endpoint name.
    pub name: String,

    /// Role registered with the directory.
    pub role: Role,

    /// Listen address of the envelope transport.
    pub listen: String,

    /// Address of the directory server.
    pub directory: String,

    /// Intake listener address (intake roles only).
    pub intake: Option<String>,

    /// Status API address (monitor only, disabled when unset).
    pub api: Option<SocketAddr>,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self::for_role(Role::Monitor)
    }
}

impl NodeConfig {
    /// Defaults for a role.
    pub fn for_role(role: Role) -> Self {
        Self {
            name: format!("{}@liaison", role),
            role,
            listen: "127.0.0.1:7100".to_string(),
            directory: "127.0.0.1:7000".to_string(),
            intake: role.intake().map(|(addr, _)| addr.to_string()),
            api: None,
        }
    }

    /// Create config from environment variables with sensible defaults.
    pub fn from_env() -> Self {
        Self::from_vars(|key| std::env::var(key).ok())
    }

    /// Create config from an arbitrary variable source.
    pub fn from_vars(get: impl Fn(&str) -> Option<String>) -> Self {
        let var = |key: &str| get(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let role = match var("LIAISON_ROLE") {
            Some(raw) => raw.parse::<Role>().unwrap_or_else(|e| {
                warn!("{}, falling back to monitor", e);
                Role::Monitor
            }),
            None => Role::Monitor,
        };
        let mut config = Self::for_role(role);

        if let Some(name) = var("LIAISON_NAME") {
            config.name = name;
        }
        if let Some(listen) = var("LIAISON_LISTEN") {
            config.listen = listen;
        }
        if let Some(directory) = var("LIAISON_DIRECTORY") {
            config.directory = directory;
        }
        if role.intake().is_some() {
            if let Some(intake) = var("LIAISON_INTAKE") {
                config.intake = Some(intake);
            }
        }
        if let Some(api) = var("LIAISON_API") {
            match api.parse() {
                Ok(addr) => config.api = Some(addr),
                Err(_) => warn!(value = %api, "Invalid LIAISON_API, status API disabled"),
            }
        }
        config
    }

    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    #[must_use]
    pub fn with_intake(mut self, intake: Option<String>) -> Self {
        self.intake = intake;
        self
    }

    #[must_use]
    pub fn with_api(mut self, api: Option<SocketAddr>) -> Self {
        self.api = api;
        self
    }
}
