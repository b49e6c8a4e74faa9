//! Classifies CA responses.
//!
//! Every CA response is a JSON envelope:
//!
//! ```json
//! {"success": true, "result": {...}, "errors": [{"code": 0, "message": ""}], "messages": [...]}
//! ```
//!
//! and every response ends up as one of three things: a success carrying the
//! `result` object, a *soft* failure carrying nothing but the status code, or
//! a hard [`Error::Protocol`]. Which one depends on the status code and the
//! configured threshold: statuses in `[400, threshold)` are soft, statuses at
//! or above the threshold are hard.

use crate::{
    ca::{config::DEFAULT_STATUS_THRESHOLD, transport::HttpResponse},
    error::{Error, Result},
    util::ser,
};
use serde_derive::Deserialize;
use serde_json::{Map, Value};
use tracing::{info, trace, warn};

/// The result key the status code gets merged into.
pub const STATUS_CODE_KEY: &str = "statusCode";
/// Statuses at or above this are client errors, even when they sit below the
/// threshold.
const CLIENT_ERROR_FLOOR: u16 = 400;
/// How much of a body we put into an error message.
const SNIPPET_LEN: usize = 512;

/// An error or informational message from the CA.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct CaMessage {
    #[serde(default)]
    pub code: i64,
    #[serde(default)]
    pub message: String,
}

impl std::fmt::Display for CaMessage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "code: {}, message: {}", self.code, self.message)
    }
}

#[derive(Debug, Deserialize)]
struct Envelope {
    #[serde(default)]
    success: Option<bool>,
    #[serde(default)]
    result: Option<Value>,
    #[serde(default)]
    errors: Option<Vec<CaMessage>>,
    #[serde(default)]
    messages: Option<Vec<CaMessage>>,
}

/// A classified CA response.
#[derive(Debug, Clone, PartialEq)]
pub enum CaResponse {
    /// The `result` object, with the status merged in under [`STATUS_CODE_KEY`].
    Success { status: u16, result: Map<String, Value> },
    /// The CA said no, but not loudly enough to be an error. There is no data.
    Soft { status: u16 },
}

impl CaResponse {
    pub fn status(&self) -> u16 {
        match self {
            Self::Success { status, .. } | Self::Soft { status } => *status,
        }
    }

    pub fn is_soft(&self) -> bool {
        matches!(self, Self::Soft { .. })
    }

    /// The result object, if this was a success.
    pub fn result(&self) -> Option<&Map<String, Value>> {
        match self {
            Self::Success { result, .. } => Some(result),
            Self::Soft { .. } => None,
        }
    }

    pub fn into_result(self) -> Option<Map<String, Value>> {
        match self {
            Self::Success { result, .. } => Some(result),
            Self::Soft { .. } => None,
        }
    }
}

/// Turns raw responses into [`CaResponse`]s.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResponseParser {
    threshold: u16,
}

impl Default for ResponseParser {
    fn default() -> Self {
        Self::new(DEFAULT_STATUS_THRESHOLD)
    }
}

impl ResponseParser {
    pub fn new(threshold: u16) -> Self {
        Self { threshold }
    }

    pub fn threshold(&self) -> u16 {
        self.threshold
    }

    /// Classify a response. `request` describes what was sent (`POST url`) and
    /// ends up in any error message.
    pub fn parse(&self, request: &str, response: &HttpResponse) -> Result<CaResponse> {
        let status = *response.status();
        let body = response.body().as_deref().unwrap_or("");
        trace!("{} -> {}: {}", request, status, body);
        let envelope = if body.trim().is_empty() {
            None
        } else {
            serde_json::from_str::<Envelope>(body).ok()
        };

        if status >= self.threshold {
            let first_error = envelope
                .as_ref()
                .and_then(|e| e.errors.as_ref())
                .and_then(|errs| errs.first());
            let message = match first_error {
                Some(err) => format!("{} failed with {}. Response: {}", request, err, ser::snippet(body, SNIPPET_LEN)),
                None => format!("{} failed with body: {}", request, ser::snippet(body, SNIPPET_LEN)),
            };
            Err(Error::Protocol { status, message })?;
        }

        if body.trim().is_empty() {
            Err(Error::Protocol {
                status,
                message: format!("{}: empty response", request),
            })?;
        }
        let envelope = envelope.ok_or_else(|| Error::Protocol {
            status,
            message: format!("{}: unparseable response: {}", request, ser::snippet(body, SNIPPET_LEN)),
        })?;

        let first_error = envelope.errors.as_ref().and_then(|errs| errs.first());
        if status >= CLIENT_ERROR_FLOOR {
            if let Some(err) = first_error {
                info!("{} soft failure, status {}: {}", request, status, err);
            }
            return Ok(CaResponse::Soft { status });
        }
        if let Some(err) = first_error {
            warn!("{} succeeded with errors, status {}: {}", request, status, err);
        }

        if envelope.success != Some(true) {
            Err(Error::Protocol {
                status,
                message: format!("{}: response did not report success: {}", request, ser::snippet(body, SNIPPET_LEN)),
            })?;
        }
        let mut result = match envelope.result {
            Some(Value::Object(map)) => map,
            _ => Err(Error::Protocol {
                status,
                message: format!("{}: response is missing its result: {}", request, ser::snippet(body, SNIPPET_LEN)),
            })?,
        };
        if let Some(msg) = envelope.messages.as_ref().and_then(|m| m.first()) {
            info!("{}: {}", request, msg);
        }
        result.insert(STATUS_CODE_KEY.into(), Value::from(status));
        Ok(CaResponse::Success { status, result })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn res(status: u16, body: Value) -> HttpResponse {
        HttpResponse::new(status, Some(body.to_string()))
    }

    fn errors_body() -> Value {
        json!({
            "success": true,
            "result": {"secret": "xyz"},
            "errors": [{"code": 20, "message": "Authorization failure"}],
            "messages": [],
        })
    }

    #[test]
    fn parse_success() {
        let parser = ResponseParser::default();
        let res = parser
            .parse(
                "POST x",
                &res(201, json!({"success": true, "result": {"secret": "xyz"}, "errors": [], "messages": [{"code": 1, "message": "hi"}]})),
            )
            .unwrap();
        assert_eq!(res.status(), 201);
        let result = res.result().unwrap();
        assert_eq!(result.get("secret"), Some(&json!("xyz")));
        assert_eq!(result.get(STATUS_CODE_KEY), Some(&json!(201)));
    }

    #[test]
    fn parse_threshold_classification() {
        // below 400 with errors: logged, passed through
        let parser = ResponseParser::new(400);
        let passthrough = parser.parse("POST x", &res(399, errors_body())).unwrap();
        assert!(!passthrough.is_soft());
        assert_eq!(passthrough.result().unwrap().get("secret"), Some(&json!("xyz")));

        // at 400 with threshold 400: hard
        let hard = parser.parse("POST x", &res(400, errors_body()));
        assert!(matches!(hard, Err(Error::Protocol { status: 400, .. })));

        // at 400 with threshold 401: soft
        let parser = ResponseParser::new(401);
        assert_eq!(parser.parse("POST x", &res(400, errors_body())).unwrap(), CaResponse::Soft { status: 400 });

        // at 400 with threshold 399: hard
        let parser = ResponseParser::new(399);
        let hard = parser.parse("POST x", &res(400, errors_body()));
        assert!(matches!(hard, Err(Error::Protocol { status: 400, .. })));
        // ...and 399 too
        let hard = parser.parse("POST x", &res(399, errors_body()));
        assert!(matches!(hard, Err(Error::Protocol { status: 399, .. })));
    }

    #[test]
    fn parse_soft_window() {
        let parser = ResponseParser::new(500);
        for status in [400, 401, 404, 499] {
            let res = parser.parse("GET x", &res(status, json!({"success": false, "result": null, "errors": [{"code": 63, "message": "nope"}]})));
            assert_eq!(res.unwrap(), CaResponse::Soft { status });
        }
        let res = parser.parse("GET x", &res(500, json!({"success": false, "errors": [{"code": 63, "message": "nope"}]})));
        match res {
            Err(Error::Protocol { status, message }) => {
                assert_eq!(status, 500);
                assert!(message.contains("code: 63, message: nope"), "{}", message);
            }
            _ => panic!("bad result: {:?}", res),
        }
    }

    #[test]
    fn parse_hard_keeps_body_snippet() {
        let parser = ResponseParser::default();
        let response = HttpResponse::new(502, Some("<html>bad gateway</html>".into()));
        match parser.parse("POST https://ca/api/v1/enroll", &response) {
            Err(Error::Protocol { status, message }) => {
                assert_eq!(status, 502);
                assert!(message.contains("POST https://ca/api/v1/enroll"));
                assert!(message.contains("<html>bad gateway</html>"));
            }
            other => panic!("bad result: {:?}", other),
        }
    }

    #[test]
    fn parse_hard_keeps_error_and_body() {
        let parser = ResponseParser::default();
        let body = json!({"success": false, "errors": [{"code": 71, "message": "denied"}], "result": {"detail": "no such ca"}});
        match parser.parse("GET https://ca/api/v1/cainfo", &res(503, body)) {
            Err(Error::Protocol { status, message }) => {
                assert_eq!(status, 503);
                assert!(message.contains("code: 71, message: denied"), "{}", message);
                assert!(message.contains("no such ca"), "{}", message);
            }
            other => panic!("bad result: {:?}", other),
        }
    }

    #[test]
    fn parse_envelope_violations() {
        let parser = ResponseParser::default();
        let empty = parser.parse("POST x", &HttpResponse::new(200, None));
        assert!(matches!(empty, Err(Error::Protocol { status: 200, .. })));
        let blank = parser.parse("POST x", &HttpResponse::new(200, Some("  ".into())));
        assert!(matches!(blank, Err(Error::Protocol { status: 200, .. })));
        let garbage = parser.parse("POST x", &HttpResponse::new(200, Some("{{{".into())));
        assert!(matches!(garbage, Err(Error::Protocol { status: 200, .. })));

        let not_success = parser.parse("POST x", &res(200, json!({"success": false, "result": {}})));
        assert!(matches!(not_success, Err(Error::Protocol { .. })));
        let no_success = parser.parse("POST x", &res(200, json!({"result": {}})));
        assert!(matches!(no_success, Err(Error::Protocol { .. })));
        let no_result = parser.parse("POST x", &res(200, json!({"success": true})));
        assert!(matches!(no_result, Err(Error::Protocol { .. })));
        let bad_result = parser.parse("POST x", &res(200, json!({"success": true, "result": "lol"})));
        assert!(matches!(bad_result, Err(Error::Protocol { .. })));
        let null_lists = parser.parse("POST x", &res(200, json!({"success": true, "result": {}, "errors": null, "messages": null})));
        assert!(null_lists.is_ok());
    }
}
