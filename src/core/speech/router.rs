//! Inbound frame parsing and routing policy.
//!
//! Every frame off the duplex stream must be a JSON object with exactly one
//! top-level key. Known keys deserialize into [`InboundEvent`]; well-formed
//! frames with an unrecognized key are skipped so newer protocol revisions do
//! not break the session. Anything else is a malformed frame.

use serde_json::Value;

use super::error::{SpeechError, SpeechResult};
use super::events::{InboundEvent, RemoteException};

/// Event keys this engine understands.
const KNOWN_TAGS: &[&str] = &[
    "completionStart",
    "contentStart",
    "textOutput",
    "audioOutput",
    "contentEnd",
    "toolUse",
    "usageEvent",
    "completionEnd",
    "modelStreamErrorException",
    "internalServerException",
    "validationException",
];

/// Parse one raw frame into an inbound event.
///
/// Returns `Ok(None)` for a well-formed frame whose event key is unknown.
pub fn parse_frame(frame: &[u8]) -> SpeechResult<Option<InboundEvent>> {
    let value: Value = serde_json::from_slice(frame)
        .map_err(|e| SpeechError::MalformedFrame(format!("Frame is not valid JSON: {}", e)))?;

    let obj = value
        .as_object()
        .ok_or_else(|| SpeechError::MalformedFrame("Frame is not a JSON object".to_string()))?;

    if obj.len() != 1 {
        return Err(SpeechError::MalformedFrame(format!(
            "Expected exactly one top-level event key, found {}",
            obj.len()
        )));
    }

    // Sole-key invariant holds here; owned so the value can be consumed below
    let tag = obj.keys().next().cloned().unwrap_or_default();
    if !KNOWN_TAGS.contains(&tag.as_str()) {
        tracing::debug!(tag, "Skipping unrecognized inbound event");
        return Ok(None);
    }

    serde_json::from_value::<InboundEvent>(value)
        .map(Some)
        .map_err(|e| SpeechError::MalformedFrame(format!("Bad {} payload: {}", tag, e)))
}

/// Map an exception frame to its error, or `None` for a regular event.
pub fn exception_error(event: &InboundEvent) -> Option<SpeechError> {
    fn msg(e: &RemoteException) -> String {
        if e.message.is_empty() {
            "No message provided".to_string()
        } else {
            e.message.clone()
        }
    }

    match event {
        InboundEvent::ModelStreamErrorException(e) => Some(SpeechError::ModelStream(msg(e))),
        InboundEvent::InternalServerException(e) => Some(SpeechError::InternalServer(msg(e))),
        InboundEvent::ValidationException(e) => Some(SpeechError::Validation(msg(e))),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::speech::error::INPUT_TIMEOUT_MESSAGE;

    #[test]
    fn test_parse_known_event() {
        let frame = br#"{"completionEnd":{"completionId":"t1","stopReason":"END_TURN"}}"#;
        let event = parse_frame(frame).unwrap().unwrap();
        assert_eq!(event.tag(), "completionEnd");
    }

    #[test]
    fn test_unknown_tag_is_skipped() {
        let frame = br#"{"somethingNew":{"future":"field"}}"#;
        assert!(parse_frame(frame).unwrap().is_none());
    }

    #[test]
    fn test_malformed_frames_rejected() {
        assert!(matches!(
            parse_frame(b"not json"),
            Err(SpeechError::MalformedFrame(_))
        ));
        assert!(matches!(
            parse_frame(br#"["textOutput"]"#),
            Err(SpeechError::MalformedFrame(_))
        ));
        assert!(matches!(
            parse_frame(br#"{}"#),
            Err(SpeechError::MalformedFrame(_))
        ));
        assert!(matches!(
            parse_frame(br#"{"textOutput":{},"audioOutput":{}}"#),
            Err(SpeechError::MalformedFrame(_))
        ));
    }

    #[test]
    fn test_known_tag_with_bad_payload_rejected() {
        // toolUse requires toolUseId and toolName
        let frame = br#"{"toolUse":{"content":"{}"}}"#;
        match parse_frame(frame) {
            Err(SpeechError::MalformedFrame(message)) => {
                assert!(message.contains("toolUse"), "message was: {}", message);
            }
            other => panic!("Expected malformed-frame error, got {:?}", other.map(|_| ())),
        }
    }

    #[test]
    fn test_exception_mapping() {
        let frame = br#"{"modelStreamErrorException":{"message":"hiccup"}}"#;
        let event = parse_frame(frame).unwrap().unwrap();
        let err = exception_error(&event).unwrap();
        assert!(matches!(err, SpeechError::ModelStream(_)));
        assert!(err.keeps_queue_open());

        let frame = br#"{"internalServerException":{}}"#;
        let event = parse_frame(frame).unwrap().unwrap();
        let err = exception_error(&event).unwrap();
        assert!(matches!(err, SpeechError::InternalServer(_)));
        assert!(err.to_string().contains("No message provided"));
    }

    #[test]
    fn test_input_timeout_classifies_as_validation() {
        let raw = format!(
            r#"{{"validationException":{{"message":"{}: promptName=p1"}}}}"#,
            INPUT_TIMEOUT_MESSAGE
        );
        let event = parse_frame(raw.as_bytes()).unwrap().unwrap();
        let err = exception_error(&event).unwrap();
        assert!(err.is_input_timeout());
    }

    #[test]
    fn test_regular_event_is_not_exception() {
        let frame = br#"{"completionStart":{"promptName":"p1"}}"#;
        let event = parse_frame(frame).unwrap().unwrap();
        assert!(exception_error(&event).is_none());
    }
}
