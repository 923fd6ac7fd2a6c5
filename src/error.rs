use crate::types::GraphqlError;

/// Everything that can go wrong while talking to start.gg.
#[derive(thiserror::Error, Debug)]
pub enum StartggError {
    /// Network, TLS or timeout failure before a response arrived.
    #[error("start.gg request failed: {0}")]
    Transport(#[from] reqwest::Error),

    /// Server answered with a non-success status code.
    #[error("start.gg returned {status}: {body}")]
    HttpStatus { status: u16, body: String },

    /// Body was not the JSON shape we expected.
    #[error("start.gg response could not be parsed: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("start.gg response returned neither `data` nor `errors`")]
    MissingData,

    #[error("start.gg API token is not set (config startggToken or STARTGG_TOKEN)")]
    MissingToken,

    /// The query was refused because its estimated cost is over the server limit.
    #[error("start.gg rejected the query as too complex: {0}")]
    ComplexityRejected(String),

    #[error("start.gg errors: {}", join_messages(.0))]
    Remote(Vec<GraphqlError>),

    #[error("event not found: {0}")]
    EventNotFound(String),

    /// The light query was rejected for complexity too.
    #[error("even the light query hit the complexity limit: {0}")]
    ExhaustedFallback(String),
}

impl StartggError {
    pub fn is_transport_failure(&self) -> bool {
        matches!(
            self,
            Self::Transport(_) | Self::HttpStatus { .. } | Self::Decode(_) | Self::MissingData
        )
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::Transport(_) | Self::HttpStatus { .. } | Self::Decode(_) | Self::MissingData => "transport",
            Self::MissingToken => "config",
            Self::ComplexityRejected(_) => "complexity",
            Self::Remote(_) => "remote",
            Self::EventNotFound(_) => "eventNotFound",
            Self::ExhaustedFallback(_) => "exhaustedFallback",
        }
    }

    /// Text suitable for the live display.
    pub fn user_message(&self) -> String {
        match self {
            Self::EventNotFound(event) => {
                format!("Event \"{event}\" was not found on start.gg. Check the slug or id for typos.")
            }
            Self::ExhaustedFallback(_) => {
                "start.gg refused even the minimal query. Reduce perPage and retry later.".to_string()
            }
            Self::MissingToken => "start.gg API token is not configured.".to_string(),
            other => other.to_string(),
        }
    }
}

fn join_messages(errors: &[GraphqlError]) -> String {
    errors
        .iter()
        .map(|err| err.message_text())
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn remote(message: &str) -> GraphqlError {
        serde_json::from_value(serde_json::json!({ "message": message, "locations": [] })).unwrap()
    }

    #[test]
    fn remote_error_joins_messages() {
        let err = StartggError::Remote(vec![remote("bad field"), remote("bad arg")]);
        assert_eq!(err.to_string(), "start.gg errors: bad field, bad arg");
        assert_eq!(err.kind(), "remote");
        assert!(!err.is_transport_failure());
    }

    #[test]
    fn user_messages_are_distinct_for_actionable_kinds() {
        let missing = StartggError::EventNotFound("tournament/x/event/y".to_string());
        let exhausted = StartggError::ExhaustedFallback("complexity 1200".to_string());
        assert!(missing.user_message().contains("Check the slug"));
        assert!(exhausted.user_message().contains("Reduce perPage"));
        assert_ne!(missing.kind(), exhausted.kind());
    }

    #[test]
    fn http_status_counts_as_transport() {
        let err = StartggError::HttpStatus { status: 503, body: "busy".to_string() };
        assert!(err.is_transport_failure());
        assert_eq!(err.kind(), "transport");
    }
}
