//! Envelopes exchanged between agents.
//!
//! An [`Envelope`] is the unit of point-to-point communication in the mesh:
//! a performative, a sender, one or more receivers and a short string body.
//! Requests may carry a reply deadline; replies reference the conversation
//! they answer through `in_reply_to`.
//!
//! [`Selector`] filters inbound envelopes by performative and/or content, the
//! same way a receive template does.

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Body of a liveness probe request.
pub const PING: &str = "ping";

/// Body of an affirmative liveness reply.
pub const PONG: &str = "pong";

/// Current wall-clock time as unix milliseconds.
pub fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or_default()
}

/// Identity of one agent in the mesh.
///
/// `name` is globally unique (`local@platform`); `addr` is where the
/// transport can reach it. Immutable once obtained from the directory.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EndpointRef {
    name: String,
    addr: String,
}

impl EndpointRef {
    /// Create a new endpoint reference.
    pub fn new(name: impl Into<String>, addr: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            addr: addr.into(),
        }
    }

    /// Globally unique name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Transport address.
    pub fn addr(&self) -> &str {
        &self.addr
    }

    /// Name without the `@platform` suffix.
    pub fn local_name(&self) -> &str {
        self.name.split('@').next().unwrap_or(&self.name)
    }
}

impl std::fmt::Display for EndpointRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name)
    }
}

/// Communicative act of an envelope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Performative {
    Request,
    Inform,
    Failure,
    Refuse,
}

impl std::fmt::Display for Performative {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Request => write!(f, "REQUEST"),
            Self::Inform => write!(f, "INFORM"),
            Self::Failure => write!(f, "FAILURE"),
            Self::Refuse => write!(f, "REFUSE"),
        }
    }
}

/// A typed message between agents.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Envelope {
    /// Conversation this envelope opens or belongs to.
    pub conversation_id: String,

    /// Conversation this envelope answers, if it is a reply.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub in_reply_to: Option<String>,

    pub performative: Performative,

    pub sender: EndpointRef,

    pub receivers: Vec<EndpointRef>,

    pub content: String,

    /// Reply deadline as unix milliseconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reply_by: Option<u64>,
}

impl Envelope {
    /// Create an envelope opening a fresh conversation.
    pub fn new(
        performative: Performative,
        sender: EndpointRef,
        receiver: EndpointRef,
        content: impl Into<String>,
    ) -> Self {
        Self {
            conversation_id: Uuid::new_v4().to_string(),
            in_reply_to: None,
            performative,
            sender,
            receivers: vec![receiver],
            content: content.into(),
            reply_by: None,
        }
    }

    /// Shorthand for a `Request`.
    pub fn request(sender: EndpointRef, receiver: EndpointRef, content: impl Into<String>) -> Self {
        Self::new(Performative::Request, sender, receiver, content)
    }

    /// Shorthand for an `Inform`.
    pub fn inform(sender: EndpointRef, receiver: EndpointRef, content: impl Into<String>) -> Self {
        Self::new(Performative::Inform, sender, receiver, content)
    }

    /// Liveness probe addressed to `receiver`, expecting an answer within `timeout`.
    pub fn ping(sender: EndpointRef, receiver: EndpointRef, timeout: Duration) -> Self {
        Self::request(sender, receiver, PING).with_reply_by(now_millis() + timeout.as_millis() as u64)
    }

    /// Set the reply deadline (unix millis).
    #[must_use]
    pub fn with_reply_by(mut self, deadline_millis: u64) -> Self {
        self.reply_by = Some(deadline_millis);
        self
    }

    /// Add another receiver.
    #[must_use]
    pub fn with_receiver(mut self, receiver: EndpointRef) -> Self {
        self.receivers.push(receiver);
        self
    }

    /// Build a reply to this envelope, sent by `from`.
    pub fn create_reply(
        &self,
        from: EndpointRef,
        performative: Performative,
        content: impl Into<String>,
    ) -> Self {
        Self {
            conversation_id: Uuid::new_v4().to_string(),
            in_reply_to: Some(self.conversation_id.clone()),
            performative,
            sender: from,
            receivers: vec![self.sender.clone()],
            content: content.into(),
            reply_by: None,
        }
    }

    /// Content trimmed and lower-cased, as used for marker comparison.
    pub fn normalized_content(&self) -> String {
        self.content.trim().to_lowercase()
    }

    /// Whether this is a liveness probe request.
    pub fn is_ping(&self) -> bool {
        self.performative == Performative::Request && self.normalized_content() == PING
    }

    /// Whether this is an affirmative liveness reply.
    pub fn is_pong(&self) -> bool {
        self.performative == Performative::Inform && self.normalized_content() == PONG
    }

    /// Whether the reply deadline has already passed.
    pub fn is_expired(&self, now_millis: u64) -> bool {
        self.reply_by.is_some_and(|deadline| now_millis > deadline)
    }

    /// Encode as a single JSON line (without the trailing newline).
    pub fn to_line(&self) -> crate::Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// Decode from a JSON line.
    pub fn from_line(line: &str) -> crate::Result<Self> {
        Ok(serde_json::from_str(line.trim())?)
    }
}

/// Receive filter over envelopes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Selector {
    /// Matches everything.
    Any,
    /// Matches a single performative.
    Performative(Performative),
    /// Matches content exactly (after trimming).
    Content(String),
    /// Both selectors match.
    And(Box<Selector>, Box<Selector>),
    /// The inner selector does not match.
    Not(Box<Selector>),
}

impl Selector {
    pub fn performative(performative: Performative) -> Self {
        Self::Performative(performative)
    }

    pub fn content(content: impl Into<String>) -> Self {
        Self::Content(content.into())
    }

    /// Combine with another selector (both must match).
    #[must_use]
    pub fn and(self, other: Selector) -> Self {
        Self::And(Box::new(self), Box::new(other))
    }

    /// Invert this selector.
    #[must_use]
    pub fn negate(self) -> Self {
        Self::Not(Box::new(self))
    }

    /// Inbound payloads: `Inform` envelopes that are not liveness replies.
    pub fn payloads() -> Self {
        Self::performative(Performative::Inform).and(Self::content(PONG).negate())
    }

    pub fn matches(&self, envelope: &Envelope) -> bool {
        match self {
            Self::Any => true,
            Self::Performative(p) => envelope.performative == *p,
            Self::Content(c) => envelope.content.trim() == c.as_str(),
            Self::And(a, b) => a.matches(envelope) && b.matches(envelope),
            Self::Not(inner) => !inner.matches(envelope),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn alice() -> EndpointRef {
        EndpointRef::new("alice@mesh", "127.0.0.1:7001")
    }

    fn bob() -> EndpointRef {
        EndpointRef::new("bob@mesh", "127.0.0.1:7002")
    }

    #[test]
    fn local_name_strips_platform() {
        assert_eq!(alice().local_name(), "alice");
        assert_eq!(EndpointRef::new("plain", "x").local_name(), "plain");
    }

    #[test]
    fn reply_targets_original_sender() {
        let ping = Envelope::ping(alice(), bob(), Duration::from_millis(1800));
        let pong = ping.create_reply(bob(), Performative::Inform, PONG);

        assert_eq!(pong.receivers, vec![alice()]);
        assert_eq!(pong.in_reply_to.as_deref(), Some(ping.conversation_id.as_str()));
        assert_ne!(pong.conversation_id, ping.conversation_id);
        assert!(ping.is_ping());
        assert!(pong.is_pong());
    }

    #[test]
    fn ping_detection_ignores_case_and_whitespace() {
        let env = Envelope::request(alice(), bob(), "  PING \n");
        assert!(env.is_ping());

        let inform = Envelope::inform(alice(), bob(), "ping");
        assert!(!inform.is_ping());
    }

    #[test]
    fn ping_carries_reply_deadline() {
        let before = now_millis();
        let ping = Envelope::ping(alice(), bob(), Duration::from_millis(4000));
        let deadline = ping.reply_by.expect("deadline set");
        assert!(deadline >= before + 4000);
        assert!(!ping.is_expired(before));
        assert!(ping.is_expired(deadline + 1));
    }

    #[test]
    fn line_encoding_survives_transport() {
        let env = Envelope::inform(alice(), bob(), "likes(mary, wine).").with_receiver(alice());
        let line = env.to_line().unwrap();
        assert!(!line.contains('\n'));
        assert_eq!(Envelope::from_line(&line).unwrap(), env);
    }

    #[test]
    fn invalid_line_is_rejected() {
        assert!(Envelope::from_line("{not json").is_err());
    }

    #[test]
    fn payload_selector_excludes_pong() {
        let selector = Selector::payloads();
        assert!(selector.matches(&Envelope::inform(alice(), bob(), "fact")));
        assert!(!selector.matches(&Envelope::inform(alice(), bob(), "pong")));
        assert!(!selector.matches(&Envelope::request(alice(), bob(), "fact")));
    }

    #[test]
    fn performative_display() {
        assert_eq!(format!("{}", Performative::Request), "REQUEST");
        assert_eq!(format!("{}", Performative::Refuse), "REFUSE");
    }
}
