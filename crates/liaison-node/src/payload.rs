//! Payload shaping between parser and logic agents.
//!
//! Formulas travel as `##TYPE:<kind>## <formula>`.

/// What a formula asks the logic agent to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PayloadKind {
    Fact,
    Query,
}

impl PayloadKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Fact => "fact",
            Self::Query => "query",
        }
    }

    /// Kind of input from an intake agent, by its local name.
    ///
    /// `user`/`user-*` send facts, `query`/`query-*` send queries; anything
    /// else is not an intake agent.
    pub fn from_sender(local_name: &str) -> Option<Self> {
        let matches = |prefix: &str| {
            local_name == prefix
                || local_name
                    .strip_prefix(prefix)
                    .is_some_and(|rest| rest.starts_with('-'))
        };
        if matches("user") {
            Some(Self::Fact)
        } else if matches("query") {
            Some(Self::Query)
        } else {
            None
        }
    }
}

impl std::fmt::Display for PayloadKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Prefix `formula` with its kind marker.
pub fn tag(kind: PayloadKind, formula: &str) -> String {
    format!("##TYPE:{}## {}", kind, formula.trim())
}

/// Split a tagged payload into its kind and body.
///
/// Untagged payloads are guessed from the `?-` query prefix.
pub fn untag(content: &str) -> (PayloadKind, &str) {
    let content = content.trim();
    if let Some(rest) = content.strip_prefix("##TYPE:") {
        if let Some((kind, body)) = rest.split_once("##") {
            let kind = match kind.trim().to_ascii_lowercase().as_str() {
                "query" => Some(PayloadKind::Query),
                "fact" => Some(PayloadKind::Fact),
                _ => None,
            };
            if let Some(kind) = kind {
                return (kind, body.trim());
            }
        }
    }
    if content.starts_with("?-") {
        (PayloadKind::Query, content)
    } else {
        (PayloadKind::Fact, content)
    }
}

/// Ensure a query formula starts with `?- `.
pub fn as_query(formula: &str) -> String {
    let formula = formula.trim();
    if formula.starts_with("?-") {
        formula.to_string()
    } else {
        format!("?- {}", formula)
    }
}
