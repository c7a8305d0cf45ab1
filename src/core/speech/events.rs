//! Wire event types for the bidirectional speech protocol.
//!
//! Every frame on the duplex stream is a single JSON object with exactly one
//! top-level key naming the event type. Keys are camelCase.
//!
//! # Protocol Overview
//!
//! Outbound events (sent to the model):
//! - sessionStart - Open a session with inference parameters
//! - promptStart - Declare a prompt, its output formats and tools
//! - contentStart - Open one content stream (text, audio or tool data)
//! - textInput - Text payload for an open content stream
//! - audioInput - Base64 audio payload for an open content stream
//! - toolResult - Result payload for a tool-use round trip
//! - contentEnd - Close a content stream
//! - promptEnd - Close a prompt
//! - sessionEnd - Close the session
//!
//! Inbound events (received from the model):
//! - completionStart - Model begins a turn
//! - contentStart - Model opens a content stream (role + type)
//! - textOutput - Transcription or generated text
//! - audioOutput - Base64 audio chunk
//! - contentEnd - Model closes a content stream (stop reason)
//! - toolUse - Model requests a tool invocation
//! - usageEvent - Running token totals
//! - completionEnd - Model finishes the turn
//! - modelStreamErrorException / internalServerException /
//!   validationException - Error frames embedded in the stream

use serde::{Deserialize, Serialize};

// =============================================================================
// Shared Vocabulary
// =============================================================================

/// Speaker role attached to content streams and text output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Role {
    /// End user speech or text
    User,
    /// Model-generated speech or text
    Assistant,
    /// System instructions
    System,
    /// Tool result content
    Tool,
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Role::User => write!(f, "user"),
            Role::Assistant => write!(f, "assistant"),
            Role::System => write!(f, "system"),
            Role::Tool => write!(f, "tool"),
        }
    }
}

/// Content stream payload type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ContentType {
    /// Text payload
    Text,
    /// Audio payload
    Audio,
    /// Tool result payload
    Tool,
}

/// Why a content stream or turn ended.
///
/// `Interrupted` is a normal, recoverable turn boundary (barge-in), never a
/// terminal session failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StopReason {
    /// Normal end of turn
    #[default]
    EndTurn,
    /// Partial turn, more content follows
    PartialTurn,
    /// Turn cut short by user speech
    Interrupted,
    /// Model requested a tool invocation
    ToolUse,
    /// Unrecognized stop reason from a newer protocol revision
    #[serde(other)]
    Unknown,
}

// =============================================================================
// Outbound Events
// =============================================================================

/// One outbound protocol frame.
///
/// External serde tagging produces exactly one top-level key per frame.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum OutboundEvent {
    /// Open the session
    SessionStart(SessionStartPayload),
    /// Declare a prompt
    PromptStart(PromptStartPayload),
    /// Open a content stream
    ContentStart(ContentStartPayload),
    /// Text payload
    TextInput(TextInputPayload),
    /// Audio payload (base64)
    AudioInput(AudioInputPayload),
    /// Tool result payload
    ToolResult(ToolResultPayload),
    /// Close a content stream
    ContentEnd(ContentEndPayload),
    /// Close a prompt
    PromptEnd(PromptEndPayload),
    /// Close the session
    SessionEnd(SessionEndPayload),
}

/// Inference parameters on the wire.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InferenceWire {
    /// Maximum output tokens
    pub max_tokens: u32,
    /// Nucleus sampling parameter
    pub top_p: f32,
    /// Sampling temperature
    pub temperature: f32,
}

/// sessionStart payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionStartPayload {
    /// Inference parameters for the whole session
    pub inference_configuration: InferenceWire,
}

/// Media type declaration for text or tool content.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MediaConfig {
    /// MIME type of the payload
    pub media_type: String,
}

/// Audio output format declaration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AudioOutputConfig {
    /// MIME type of the payload
    pub media_type: String,
    /// Sample rate in Hz
    pub sample_rate_hertz: u32,
    /// Bits per sample
    pub sample_size_bits: u32,
    /// Channel count
    pub channel_count: u32,
    /// Voice identifier
    pub voice_id: String,
    /// Payload encoding
    pub encoding: String,
    /// Speech or non-speech audio
    pub audio_type: String,
}

/// Audio input format declaration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AudioInputConfig {
    /// MIME type of the payload
    pub media_type: String,
    /// Sample rate in Hz
    pub sample_rate_hertz: u32,
    /// Bits per sample
    pub sample_size_bits: u32,
    /// Channel count
    pub channel_count: u32,
    /// Speech or non-speech audio
    pub audio_type: String,
    /// Payload encoding
    pub encoding: String,
}

/// Tool declaration sent with promptStart.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolSpecWire {
    /// The wrapped tool specification
    pub tool_spec: ToolSpecInner,
}

/// Inner tool specification.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolSpecInner {
    /// Tool name
    pub name: String,
    /// Tool description
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// JSON schema for the tool input
    pub input_schema: ToolInputSchema,
}

/// Tool input schema carrier (JSON schema as a string).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolInputSchema {
    /// Serialized JSON schema
    pub json: String,
}

/// Tool configuration block on promptStart.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolConfiguration {
    /// Declared tools
    pub tools: Vec<ToolSpecWire>,
}

/// promptStart payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PromptStartPayload {
    /// Prompt name referenced by all content for this prompt
    pub prompt_name: String,
    /// Text output format
    pub text_output_configuration: MediaConfig,
    /// Audio output format, including the voice
    pub audio_output_configuration: AudioOutputConfig,
    /// Tool output format
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_use_output_configuration: Option<MediaConfig>,
    /// Declared tools
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_configuration: Option<ToolConfiguration>,
}

/// Correlation block for tool result content.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolResultInputConfig {
    /// Identifier from the originating toolUse event
    pub tool_use_id: String,
    /// Result payload type
    #[serde(rename = "type")]
    pub content_type: ContentType,
    /// Result media type
    pub text_input_configuration: MediaConfig,
}

/// contentStart payload (outbound).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContentStartPayload {
    /// Prompt this content belongs to
    pub prompt_name: String,
    /// Unique content name bracketing the triplet
    pub content_name: String,
    /// Payload type
    #[serde(rename = "type")]
    pub content_type: ContentType,
    /// Whether this content participates in live turn taking
    pub interactive: bool,
    /// Speaker role
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<Role>,
    /// Text payload format
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text_input_configuration: Option<MediaConfig>,
    /// Audio payload format
    #[serde(skip_serializing_if = "Option::is_none")]
    pub audio_input_configuration: Option<AudioInputConfig>,
    /// Tool result correlation
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_result_input_configuration: Option<ToolResultInputConfig>,
}

/// textInput payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TextInputPayload {
    /// Prompt name
    pub prompt_name: String,
    /// Content name
    pub content_name: String,
    /// Text content
    pub content: String,
}

/// audioInput payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AudioInputPayload {
    /// Prompt name
    pub prompt_name: String,
    /// Content name
    pub content_name: String,
    /// Base64-encoded audio frame
    pub content: String,
}

/// toolResult payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolResultPayload {
    /// Prompt name
    pub prompt_name: String,
    /// Content name
    pub content_name: String,
    /// Serialized JSON result or error envelope
    pub content: String,
}

/// contentEnd payload (outbound).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContentEndPayload {
    /// Prompt name
    pub prompt_name: String,
    /// Content name being closed
    pub content_name: String,
}

/// promptEnd payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PromptEndPayload {
    /// Prompt name being closed
    pub prompt_name: String,
}

/// sessionEnd payload (empty on the wire).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SessionEndPayload {}

impl OutboundEvent {
    /// Short tag name for logging.
    pub fn tag(&self) -> &'static str {
        match self {
            OutboundEvent::SessionStart(_) => "sessionStart",
            OutboundEvent::PromptStart(_) => "promptStart",
            OutboundEvent::ContentStart(_) => "contentStart",
            OutboundEvent::TextInput(_) => "textInput",
            OutboundEvent::AudioInput(_) => "audioInput",
            OutboundEvent::ToolResult(_) => "toolResult",
            OutboundEvent::ContentEnd(_) => "contentEnd",
            OutboundEvent::PromptEnd(_) => "promptEnd",
            OutboundEvent::SessionEnd(_) => "sessionEnd",
        }
    }
}

// =============================================================================
// Inbound Events
// =============================================================================

/// One inbound protocol frame.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum InboundEvent {
    /// Model begins a turn
    CompletionStart(CompletionStartPayload),
    /// Model opens a content stream
    ContentStart(InboundContentStart),
    /// Transcription or generated text
    TextOutput(TextOutputPayload),
    /// Base64 audio chunk
    AudioOutput(AudioOutputPayload),
    /// Model closes a content stream
    ContentEnd(InboundContentEnd),
    /// Model requests a tool invocation
    ToolUse(ToolUsePayload),
    /// Running token totals
    UsageEvent(UsagePayload),
    /// Model finishes the turn
    CompletionEnd(CompletionEndPayload),
    /// Error raised inside the model's output stream
    ModelStreamErrorException(RemoteException),
    /// Remote internal server failure
    InternalServerException(RemoteException),
    /// Request or event rejected by remote validation
    ValidationException(RemoteException),
}

/// completionStart payload.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CompletionStartPayload {
    /// Remote session identifier
    pub session_id: Option<String>,
    /// Prompt name this turn answers
    pub prompt_name: Option<String>,
    /// Turn identifier
    pub completion_id: Option<String>,
}

/// contentStart payload (inbound).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InboundContentStart {
    /// Content identifier
    #[serde(default)]
    pub content_id: Option<String>,
    /// Payload type
    #[serde(rename = "type")]
    pub content_type: ContentType,
    /// Speaker role for this content
    pub role: Role,
    /// Extra model-specific fields, passed through verbatim
    #[serde(default)]
    pub additional_model_fields: Option<String>,
}

/// textOutput payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TextOutputPayload {
    /// Content identifier
    #[serde(default)]
    pub content_id: Option<String>,
    /// Speaker role, when repeated on the payload
    #[serde(default)]
    pub role: Option<Role>,
    /// Text content
    pub content: String,
}

/// audioOutput payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AudioOutputPayload {
    /// Content identifier
    #[serde(default)]
    pub content_id: Option<String>,
    /// Base64-encoded audio chunk
    pub content: String,
}

/// contentEnd payload (inbound).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InboundContentEnd {
    /// Content identifier
    #[serde(default)]
    pub content_id: Option<String>,
    /// Payload type, when repeated on the payload
    #[serde(rename = "type", default)]
    pub content_type: Option<ContentType>,
    /// Why the content stream ended
    #[serde(default)]
    pub stop_reason: StopReason,
}

/// toolUse payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolUsePayload {
    /// Correlation identifier for the round trip
    pub tool_use_id: String,
    /// Tool to invoke
    pub tool_name: String,
    /// Serialized JSON input
    #[serde(default)]
    pub content: String,
}

/// usageEvent payload. Totals are running values, not deltas.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct UsagePayload {
    /// Turn identifier
    pub completion_id: Option<String>,
    /// Running input token total
    pub total_input_tokens: u64,
    /// Running output token total
    pub total_output_tokens: u64,
    /// Running combined total
    pub total_tokens: u64,
}

/// completionEnd payload.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CompletionEndPayload {
    /// Turn identifier
    pub completion_id: Option<String>,
    /// Why the turn ended
    pub stop_reason: StopReason,
}

/// Error frame payload shared by the remote exception variants.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RemoteException {
    /// Human-readable message from the remote side
    pub message: String,
}

impl InboundEvent {
    /// Short tag name for logging.
    pub fn tag(&self) -> &'static str {
        match self {
            InboundEvent::CompletionStart(_) => "completionStart",
            InboundEvent::ContentStart(_) => "contentStart",
            InboundEvent::TextOutput(_) => "textOutput",
            InboundEvent::AudioOutput(_) => "audioOutput",
            InboundEvent::ContentEnd(_) => "contentEnd",
            InboundEvent::ToolUse(_) => "toolUse",
            InboundEvent::UsageEvent(_) => "usageEvent",
            InboundEvent::CompletionEnd(_) => "completionEnd",
            InboundEvent::ModelStreamErrorException(_) => "modelStreamErrorException",
            InboundEvent::InternalServerException(_) => "internalServerException",
            InboundEvent::ValidationException(_) => "validationException",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_outbound_single_top_level_key() {
        let event = OutboundEvent::PromptEnd(PromptEndPayload {
            prompt_name: "p1".to_string(),
        });
        let value = serde_json::to_value(&event).unwrap();
        let obj = value.as_object().unwrap();
        assert_eq!(obj.len(), 1);
        assert!(obj.contains_key("promptEnd"));
        assert_eq!(value["promptEnd"]["promptName"], "p1");
    }

    #[test]
    fn test_session_end_serializes_empty_object() {
        let event = OutboundEvent::SessionEnd(SessionEndPayload::default());
        let json = serde_json::to_string(&event).unwrap();
        assert_eq!(json, r#"{"sessionEnd":{}}"#);
    }

    #[test]
    fn test_inbound_round_trip() {
        let raw = r#"{"textOutput":{"contentId":"c1","role":"USER","content":"hello"}}"#;
        let event: InboundEvent = serde_json::from_str(raw).unwrap();
        match event {
            InboundEvent::TextOutput(payload) => {
                assert_eq!(payload.content, "hello");
                assert_eq!(payload.role, Some(Role::User));
                assert_eq!(payload.content_id.as_deref(), Some("c1"));
            }
            other => panic!("Unexpected event: {}", other.tag()),
        }
    }

    #[test]
    fn test_stop_reason_parsing() {
        let raw = r#"{"contentEnd":{"contentId":"c1","stopReason":"INTERRUPTED"}}"#;
        let event: InboundEvent = serde_json::from_str(raw).unwrap();
        match event {
            InboundEvent::ContentEnd(payload) => {
                assert_eq!(payload.stop_reason, StopReason::Interrupted)
            }
            other => panic!("Unexpected event: {}", other.tag()),
        }

        // Newer stop reasons must not break parsing
        let raw = r#"{"contentEnd":{"stopReason":"SOMETHING_NEW"}}"#;
        let event: InboundEvent = serde_json::from_str(raw).unwrap();
        match event {
            InboundEvent::ContentEnd(payload) => {
                assert_eq!(payload.stop_reason, StopReason::Unknown)
            }
            other => panic!("Unexpected event: {}", other.tag()),
        }
    }

    #[test]
    fn test_usage_defaults() {
        let raw = r#"{"usageEvent":{"totalInputTokens":10,"totalOutputTokens":20,"totalTokens":30}}"#;
        let event: InboundEvent = serde_json::from_str(raw).unwrap();
        match event {
            InboundEvent::UsageEvent(usage) => {
                assert_eq!(usage.total_input_tokens, 10);
                assert_eq!(usage.total_output_tokens, 20);
                assert_eq!(usage.total_tokens, 30);
                assert!(usage.completion_id.is_none());
            }
            other => panic!("Unexpected event: {}", other.tag()),
        }
    }

    #[test]
    fn test_exception_frame_parsing() {
        let raw = r#"{"validationException":{"message":"bad prompt"}}"#;
        let event: InboundEvent = serde_json::from_str(raw).unwrap();
        match event {
            InboundEvent::ValidationException(e) => assert_eq!(e.message, "bad prompt"),
            other => panic!("Unexpected event: {}", other.tag()),
        }
    }
}
