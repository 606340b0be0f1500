//! CDP (Chrome DevTools Protocol) wire envelopes
//!
//! Frames exchanged over the WebSocket. Typed command payloads live in
//! [`protocol`](super::protocol); these wrap them for transport.

use serde::{Deserialize, Serialize};

/// CDP JSON-RPC request
#[derive(Debug, Clone, Serialize)]
pub struct CdpRequest {
    /// Request ID
    pub id: u64,
    /// Method name (e.g., "Page.navigate")
    pub method: String,
    /// Method parameters
    pub params: serde_json::Value,
    /// Flattened session the command is addressed to
    #[serde(rename = "sessionId", skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
}

/// CDP JSON-RPC notification (event)
#[derive(Debug, Clone, Deserialize)]
pub struct CdpNotification {
    /// Event method (e.g., "Page.loadEventFired")
    pub method: String,
    /// Event parameters
    #[serde(default)]
    pub params: serde_json::Value,
    /// Session the event was emitted on
    #[serde(rename = "sessionId", default)]
    pub session_id: Option<String>,
}

/// CDP JSON-RPC response
#[derive(Debug, Clone, Deserialize)]
pub struct CdpRpcResponse {
    /// Response ID (matches request ID)
    pub id: u64,
    /// Response result
    #[serde(default)]
    pub result: serde_json::Value,
    /// Error if any
    #[serde(default)]
    pub error: Option<CdpErrorDetail>,
}

/// CDP error detail
#[derive(Debug, Clone, Deserialize)]
pub struct CdpErrorDetail {
    /// Error code
    pub code: i64,
    /// Error message
    pub message: String,
    /// Additional error data
    #[serde(default)]
    pub data: Option<serde_json::Value>,
}

/// Incoming frame, either a reply or an event
#[derive(Debug, Clone)]
pub enum CdpMessage {
    Response(CdpRpcResponse),
    Notification(CdpNotification),
}

impl CdpMessage {
    /// Parse a text frame; replies are tried first since events carry no `id`
    pub fn parse(text: &str) -> Option<Self> {
        if let Ok(response) = serde_json::from_str::<CdpRpcResponse>(text) {
            return Some(CdpMessage::Response(response));
        }
        serde_json::from_str::<CdpNotification>(text)
            .ok()
            .map(CdpMessage::Notification)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_request_serialization() {
        let request = CdpRequest {
            id: 3,
            method: "Page.enable".to_string(),
            params: json!({}),
            session_id: Some("S1".to_string()),
        };
        let value = serde_json::to_value(&request).unwrap();
        assert_eq!(value["sessionId"], "S1");
        assert_eq!(value["params"], json!({}));

        let browser_level = CdpRequest {
            session_id: None,
            ..request
        };
        let value = serde_json::to_value(&browser_level).unwrap();
        assert!(value.get("sessionId").is_none());
    }

    #[test]
    fn test_parse_reply_and_event() {
        match CdpMessage::parse(r#"{"id":7,"error":{"code":-32000,"message":"nope"}}"#) {
            Some(CdpMessage::Response(r)) => {
                assert_eq!(r.id, 7);
                assert_eq!(r.error.unwrap().code, -32000);
            }
            other => panic!("unexpected {:?}", other),
        }

        match CdpMessage::parse(
            r#"{"method":"Network.loadingFinished","params":{"requestId":"R"},"sessionId":"S1"}"#,
        ) {
            Some(CdpMessage::Notification(n)) => {
                assert_eq!(n.method, "Network.loadingFinished");
                assert_eq!(n.session_id.as_deref(), Some("S1"));
            }
            other => panic!("unexpected {:?}", other),
        }

        assert!(CdpMessage::parse("not json").is_none());
    }
}
