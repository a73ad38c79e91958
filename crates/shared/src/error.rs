use serde::{Deserialize, Serialize};
use thiserror::Error;

/// One entry of a structured multi-error reply.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiErrorDetail {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

/// Server error bodies arrive either as a plain `{message}` or as a
/// structured `{errors: [...]}` list; failure outcomes carry whichever
/// shape arrived, verbatim. Anything else is kept as raw JSON.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ErrorBody {
    Message { message: String },
    Errors { errors: Vec<ApiErrorDetail> },
    Raw(serde_json::Value),
}

impl ErrorBody {
    pub fn message(text: impl Into<String>) -> Self {
        Self::Message {
            message: text.into(),
        }
    }

    /// Best-effort human-readable summary for display and logs.
    pub fn summary(&self) -> String {
        match self {
            Self::Message { message } => message.clone(),
            Self::Errors { errors } => errors
                .iter()
                .map(|e| {
                    e.detail
                        .clone()
                        .or_else(|| e.title.clone())
                        .unwrap_or_else(|| "unspecified error".to_string())
                })
                .collect::<Vec<_>>()
                .join("; "),
            Self::Raw(value) => value.to_string(),
        }
    }
}

impl From<serde_json::Value> for ErrorBody {
    fn from(value: serde_json::Value) -> Self {
        serde_json::from_value(value.clone()).unwrap_or(Self::Raw(value))
    }
}

/// A failure outcome lifted into an error, for callers that want to
/// abort a flow instead of rendering the failure.
#[derive(Debug, Error)]
#[error("robot request failed: {}", body.summary())]
pub struct ApiException {
    pub body: ErrorBody,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_message_body_parses_verbatim() {
        let body: ErrorBody =
            serde_json::json!({"message": "tip not picked up"}).into();
        assert_eq!(body, ErrorBody::message("tip not picked up"));
        assert_eq!(body.summary(), "tip not picked up");
    }

    #[test]
    fn structured_errors_body_parses_verbatim() {
        let body: ErrorBody = serde_json::json!({
            "errors": [
                {"status": "403", "title": "Bad state", "detail": "command not allowed now"},
                {"title": "Second failure"}
            ]
        })
        .into();
        assert_eq!(body.summary(), "command not allowed now; Second failure");
    }

    #[test]
    fn unrecognized_body_is_kept_raw() {
        let raw = serde_json::json!(["not", "an", "error", "object"]);
        let body: ErrorBody = raw.clone().into();
        assert_eq!(body, ErrorBody::Raw(raw));
    }
}
