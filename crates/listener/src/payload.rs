//! Event payloads.
//!
//! OS2mo publishes one message per changed object. The routing key names the
//! object kind (the *service type*, e.g. `engagement`) and the body is the
//! object UUID encoded as a JSON string.

use std::fmt;

use uuid::Uuid;

use crate::HandlerError;

/// The UUID carried in an event body.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PayloadUuid(Uuid);

impl PayloadUuid {
    pub fn new(uuid: Uuid) -> Self {
        Self(uuid)
    }

    pub fn as_uuid(self) -> Uuid {
        self.0
    }

    /// Parses a message body: a JSON string (`"\"<uuid>\""`) or, leniently,
    /// bare UUID text.
    pub fn parse(body: &[u8]) -> Result<Self, HandlerError> {
        if let Ok(uuid) = serde_json::from_slice::<Uuid>(body) {
            return Ok(Self(uuid));
        }
        let text = std::str::from_utf8(body)
            .map_err(|_| HandlerError::InvalidPayload("body is not UTF-8".into()))?;
        Uuid::parse_str(text.trim())
            .map(Self)
            .map_err(|e| HandlerError::InvalidPayload(format!("'{}': {e}", truncate(text))))
    }
}

impl fmt::Display for PayloadUuid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One routed event, as handed to an [`crate::EventHandler`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MoEvent {
    /// Routing key the message arrived with.
    pub service_type: String,
    pub uuid: PayloadUuid,
}

fn truncate(text: &str) -> &str {
    match text.char_indices().nth(64) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const UUID: &str = "0b51953c-0d7a-4a5c-9d0e-5e2f4c1b8a11";

    #[test]
    fn parses_json_string_body() {
        let body = format!("\"{UUID}\"");
        let payload = PayloadUuid::parse(body.as_bytes()).unwrap();
        assert_eq!(payload.to_string(), UUID);
    }

    #[test]
    fn parses_bare_uuid_with_newline() {
        let body = format!("{UUID}\n");
        assert_eq!(PayloadUuid::parse(body.as_bytes()).unwrap().to_string(), UUID);
    }

    #[test]
    fn rejects_objects_and_garbage() {
        let body = format!("{{\"uuid\": \"{UUID}\"}}");
        assert!(matches!(
            PayloadUuid::parse(body.as_bytes()),
            Err(HandlerError::InvalidPayload(_))
        ));
        assert!(PayloadUuid::parse(b"\xff\xfe").is_err());
        assert!(PayloadUuid::parse(b"").is_err());
    }

    #[test]
    fn long_garbage_is_truncated_in_error() {
        let body = "x".repeat(500);
        let err = PayloadUuid::parse(body.as_bytes()).unwrap_err();
        assert!(err.to_string().len() < 200);
    }
}
