//! Text form of an event on the wire.
//!
//! One block per event:
//!
//! ```text
//! event: notification_created
//! data: {"title":"hello"}
//! id: 1b4e28ba-2fa1-11d2-883f-0016d3cca427
//!
//! ```
//!
//! The payload is serialized compactly, so `data` is a single line; the
//! decoder still joins repeated `data:` lines the way SSE clients do.

use crate::error::{decode_error, encode_error, DecodeErrorKind, Error};
use axum::response::sse::Event as AxumEvent;
use events::{Event, EventKind};
use serde_json::Value;

/// What survives a trip through the wire form.
#[derive(Debug, Clone, PartialEq)]
pub struct WireEvent {
    pub kind: EventKind,
    pub payload: Value,
    pub id: String,
}

impl From<&Event> for WireEvent {
    fn from(event: &Event) -> Self {
        Self {
            kind: event.kind,
            payload: event.payload.clone(),
            id: event.id.clone(),
        }
    }
}

pub fn encode(event: &Event) -> Result<String, Error> {
    let data = serde_json::to_string(&event.payload).map_err(encode_error)?;
    Ok(format!(
        "event: {}\ndata: {}\nid: {}\n\n",
        event.kind.as_str(),
        data,
        event.id
    ))
}

/// Build the axum SSE frame for an event. axum writes the fields in call
/// order, which yields exactly the block produced by [`encode`].
pub fn to_axum_event(event: &Event) -> Result<AxumEvent, Error> {
    let data = serde_json::to_string(&event.payload).map_err(encode_error)?;
    Ok(AxumEvent::default()
        .event(event.kind.as_str())
        .data(data)
        .id(event.id.clone()))
}

/// Parse a single block (trailing blank line optional).
pub fn decode(block: &str) -> Result<WireEvent, Error> {
    let mut kind: Option<&str> = None;
    let mut data: Option<String> = None;
    let mut id: Option<&str> = None;

    for line in block.lines() {
        if line.is_empty() || line.starts_with(':') {
            continue;
        }

        let (field, value) = match line.split_once(':') {
            Some((field, value)) => (field, value.strip_prefix(' ').unwrap_or(value)),
            None => (line, ""),
        };

        match field {
            "event" => kind = Some(value),
            "data" => match data.as_mut() {
                Some(existing) => {
                    existing.push('\n');
                    existing.push_str(value);
                }
                None => data = Some(value.to_string()),
            },
            "id" => id = Some(value),
            _ => {}
        }
    }

    let kind = kind
        .ok_or_else(|| decode_error(DecodeErrorKind::MissingField("event"), None))?
        .parse::<EventKind>()
        .map_err(|e| decode_error(DecodeErrorKind::UnknownEventKind, Some(Box::new(e))))?;
    let data = data.ok_or_else(|| decode_error(DecodeErrorKind::MissingField("data"), None))?;
    let id = id.ok_or_else(|| decode_error(DecodeErrorKind::MissingField("id"), None))?;
    let payload = serde_json::from_str(&data)
        .map_err(|e| decode_error(DecodeErrorKind::InvalidPayload, Some(Box::new(e))))?;

    Ok(WireEvent {
        kind,
        payload,
        id: id.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SseErrorKind;
    use serde_json::json;

    #[test]
    fn encode_produces_event_data_id_and_blank_line() {
        let mut event = Event::new(EventKind::NotificationCreated, json!({"title": "hi"}));
        event.id = "evt-1".to_string();

        assert_eq!(
            encode(&event).unwrap(),
            "event: notification_created\ndata: {\"title\":\"hi\"}\nid: evt-1\n\n"
        );
    }

    #[test]
    fn every_kind_survives_the_wire() {
        let payload = json!({
            "nested": {"list": [1, 2, 3], "text": "line one\nline two"},
            "unicode": "caf\u{e9} \u{1f680}",
            "empty": null
        });

        for kind in EventKind::ALL {
            let event = Event::new(kind, payload.clone());
            let decoded = decode(&encode(&event).unwrap()).unwrap();
            assert_eq!(decoded, WireEvent::from(&event));
        }
    }

    #[test]
    fn decode_tolerates_comments_crlf_and_split_data() {
        let block = ": keep-alive\r\nevent: system_update\r\ndata: {\"a\":\r\ndata: 1}\r\nid: x\r\n\r\n";
        let decoded = decode(block).unwrap();
        assert_eq!(decoded.kind, EventKind::SystemUpdate);
        assert_eq!(decoded.payload, json!({"a": 1}));
        assert_eq!(decoded.id, "x");
    }

    #[test]
    fn decode_reports_missing_fields() {
        let err = decode("event: heartbeat\ndata: {}\n\n").unwrap_err();
        assert_eq!(
            err.error_kind,
            SseErrorKind::Decode(DecodeErrorKind::MissingField("id"))
        );

        let err = decode("data: {}\nid: 1\n\n").unwrap_err();
        assert_eq!(
            err.error_kind,
            SseErrorKind::Decode(DecodeErrorKind::MissingField("event"))
        );
    }

    #[test]
    fn decode_rejects_unknown_kind_and_bad_json() {
        let err = decode("event: action_created\ndata: {}\nid: 1\n\n").unwrap_err();
        assert_eq!(
            err.error_kind,
            SseErrorKind::Decode(DecodeErrorKind::UnknownEventKind)
        );

        let err = decode("event: heartbeat\ndata: {not json\nid: 1\n\n").unwrap_err();
        assert_eq!(
            err.error_kind,
            SseErrorKind::Decode(DecodeErrorKind::InvalidPayload)
        );
    }

    #[test]
    fn axum_event_builds_for_every_kind() {
        for kind in EventKind::ALL {
            assert!(to_axum_event(&Event::new(kind, json!({"k": 1}))).is_ok());
        }
    }
}
