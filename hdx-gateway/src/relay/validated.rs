//! Inbound message envelope and callback validation.

use serde_json::Value;

use crate::error::GatewayError;

/// One inbound HTTP message as the relay layer sees it: the raw body to be
/// relayed unmodified plus the headers it arrived with.
#[derive(Clone, Debug, Default)]
pub struct InboundRequest {
    pub body: String,
    headers: Vec<(String, String)>,
}

impl InboundRequest {
    pub fn new(body: impl Into<String>) -> Self {
        Self {
            body: body.into(),
            headers: Vec::new(),
        }
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// Case-insensitive header lookup, first match wins.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(header, _)| header.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }
}

/// Extracts the application-level correlation id (`requestId`) from a request
/// body.
pub(crate) fn extract_request_id(body: &str) -> Result<String, GatewayError> {
    let parsed: Value = serde_json::from_str(body)
        .map_err(|err| GatewayError::InvalidRequest(format!("request body is not JSON: {err}")))?;
    parsed
        .get("requestId")
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|id| !id.is_empty())
        .map(str::to_string)
        .ok_or_else(|| GatewayError::InvalidRequest("request body has no requestId".to_string()))
}

/// A parsed inbound callback, owned transiently for the duration of one
/// relay.
#[derive(Clone, Debug)]
pub struct ValidatedCallback {
    /// Correlation id referenced by the callback body (`resp.requestId`).
    pub correlation_id: String,
    /// Actor the callback headers declare as destination. A routing hint
    /// only; the relay trusts the recorded pending state instead.
    pub declared_origin_id: Option<String>,
    /// Raw payload relayed verbatim.
    pub payload: String,
}

impl ValidatedCallback {
    /// Parses a callback body, failing when no correlation id can be
    /// extracted — there is nothing to relay such a callback to.
    pub fn parse(request: &InboundRequest, origin_header: &str) -> Result<Self, GatewayError> {
        let parsed: Value = serde_json::from_str(&request.body).map_err(|err| {
            GatewayError::MalformedCallback(format!("callback body is not JSON: {err}"))
        })?;
        let correlation_id = parsed
            .get("resp")
            .and_then(|resp| resp.get("requestId"))
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|id| !id.is_empty())
            .map(str::to_string)
            .ok_or_else(|| {
                GatewayError::MalformedCallback(
                    "callback body has no resp.requestId".to_string(),
                )
            })?;
        Ok(Self {
            correlation_id,
            declared_origin_id: request.header(origin_header).map(str::to_string),
            payload: request.body.clone(),
        })
    }
}
