//! Monitor event sink.
//!
//! Forwards membership changes to an HTTP endpoint as
//! `{"type":"REGISTER"|"DEREGISTER","name":...,"clazz":...,"when":...}`.
//! Fire-and-forget: failures are logged, the response body is ignored.

use std::time::Duration;

use liaison_health::MembershipEvent;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::error::Result;

/// Default monitor port when `MONITOR_PORT` is unset or malformed.
pub const DEFAULT_MONITOR_PORT: u16 = 4100;

const POST_TIMEOUT: Duration = Duration::from_secs(3);

/// Kind of a monitor event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum DfEventKind {
    Register,
    Deregister,
}

/// Body posted to the monitor event sink.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DfEvent {
    #[serde(rename = "type")]
    pub kind: DfEventKind,
    pub name: String,
    /// Role of the endpoint, empty when unknown.
    pub clazz: String,
    /// Unix millis.
    pub when: u64,
}

impl From<&MembershipEvent> for DfEvent {
    fn from(event: &MembershipEvent) -> Self {
        let kind = if event.is_registration() {
            DfEventKind::Register
        } else {
            DfEventKind::Deregister
        };
        Self {
            kind,
            name: event.endpoint().name().to_string(),
            clazz: event.role().to_string(),
            when: event.at(),
        }
    }
}

/// HTTP client for the monitor event sink.
#[derive(Debug, Clone)]
pub struct MonitorSink {
    client: reqwest::Client,
    url: Option<String>,
}

impl MonitorSink {
    /// Sink whose URL is read from the environment on every post.
    pub fn from_env() -> Self {
        Self {
            client: build_client(),
            url: None,
        }
    }

    /// Sink posting to a fixed URL.
    pub fn to(url: impl Into<String>) -> Self {
        Self {
            client: build_client(),
            url: Some(url.into()),
        }
    }

    /// URL the next event goes to.
    pub fn resolve_url(&self) -> String {
        match &self.url {
            Some(url) => url.clone(),
            None => env_monitor_url(),
        }
    }

    /// Post one event.
    pub async fn post(&self, event: &DfEvent) -> Result<()> {
        let url = self.resolve_url();
        let response = self.client.post(&url).json(event).send().await?;
        debug!(url = %url, status = %response.status(), name = %event.name, "Monitor event posted");
        Ok(())
    }

    /// Forward membership events until the channel closes.
    pub fn spawn_forwarder(self, mut events: broadcast::Receiver<MembershipEvent>) -> JoinHandle<()> {
        tokio::spawn(async move {
            info!("Forwarding membership events to monitor sink");
            loop {
                match events.recv().await {
                    Ok(event) => {
                        if let Err(e) = self.post(&DfEvent::from(&event)).await {
                            warn!("Monitor event dropped: {}", e);
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        warn!(skipped, "Monitor forwarder lagging, events skipped");
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        })
    }
}

fn build_client() -> reqwest::Client {
    reqwest::Client::builder()
        .timeout(POST_TIMEOUT)
        .build()
        .unwrap_or_else(|e| {
            warn!("HTTP client setup failed ({}), using defaults", e);
            reqwest::Client::new()
        })
}

/// `MONITOR_URL` if set, else `http://localhost:<MONITOR_PORT>/df-event`.
pub fn env_monitor_url() -> String {
    if let Some(url) = std::env::var("MONITOR_URL")
        .ok()
        .map(|u| u.trim().to_string())
        .filter(|u| !u.is_empty())
    {
        return url;
    }
    let port = parse_port(std::env::var("MONITOR_PORT").ok().as_deref());
    format!("http://localhost:{}/df-event", port)
}

fn parse_port(raw: Option<&str>) -> u16 {
    match raw.map(str::trim) {
        None | Some("") => DEFAULT_MONITOR_PORT,
        Some(value) => match value.parse::<u16>() {
            Ok(port) if port != 0 => port,
            _ => {
                warn!(value, "Malformed MONITOR_PORT, using {}", DEFAULT_MONITOR_PORT);
                DEFAULT_MONITOR_PORT
            }
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use liaison_health::{AgentRecord, RemovalReason};
    use liaison_protocols::EndpointRef;

    #[test]
    fn wire_format() {
        let event = DfEvent {
            kind: DfEventKind::Register,
            name: "parser@liaison".into(),
            clazz: "parser".into(),
            when: 1_700_000_000_000,
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "type": "REGISTER",
                "name": "parser@liaison",
                "clazz": "parser",
                "when": 1_700_000_000_000u64,
            })
        );
    }

    #[test]
    fn membership_event_maps_to_df_event() {
        let record = AgentRecord::admitted(EndpointRef::new("logic@liaison", "local"), "logic");
        let event = MembershipEvent::deregistered(&record, RemovalReason::NotInDirectory);
        let df = DfEvent::from(&event);
        assert_eq!(df.kind, DfEventKind::Deregister);
        assert_eq!(df.name, "logic@liaison");
        assert_eq!(df.clazz, "logic");
        assert_eq!(df.when, event.at());
    }

    #[test]
    fn monitor_port_falls_back() {
        assert_eq!(parse_port(None), 4100);
        assert_eq!(parse_port(Some("http")), 4100);
        assert_eq!(parse_port(Some("4200")), 4200);
    }

    #[test]
    fn fixed_url_wins() {
        assert_eq!(
            MonitorSink::to("http://127.0.0.1:9/df-event").resolve_url(),
            "http://127.0.0.1:9/df-event"
        );
    }
}
