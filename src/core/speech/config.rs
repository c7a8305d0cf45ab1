//! Configuration types for the streaming speech session engine.
//!
//! A [`SessionConfig`] describes one conversation: system prompt, voice,
//! inference parameters, prior history, optional direct audio, tool
//! declarations, and the call control signal. Validation happens before any
//! session work; invalid configs are never sent to the remote side.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use bytes::Bytes;
use serde::{Deserialize, Serialize};

use super::error::{SpeechError, SpeechResult};
use super::events::Role;
use super::tools::ToolConfig;

// =============================================================================
// Constants
// =============================================================================

/// Input audio sample rate in Hz (PCM 16-bit mono).
pub const INPUT_SAMPLE_RATE: u32 = 16_000;

/// Output audio sample rate in Hz (PCM 16-bit mono).
pub const OUTPUT_SAMPLE_RATE: u32 = 24_000;

/// Bits per audio sample.
pub const SAMPLE_SIZE_BITS: u32 = 16;

/// Audio channel count (mono).
pub const CHANNEL_COUNT: u32 = 1;

/// Duration of one outbound audio frame in milliseconds.
///
/// Frames are sized to the remote model's real-time cadence so audio arrives
/// at its expected pace instead of one oversized burst.
pub const AUDIO_FRAME_DURATION_MS: u32 = 30;

/// Default cap on the number of history messages sent with a prompt.
pub const DEFAULT_MAX_HISTORY_MESSAGES: usize = 40;

/// Default cap on total history characters sent with a prompt.
pub const DEFAULT_MAX_HISTORY_CHARS: usize = 16_000;

/// Grace delay before closing the outbound queue on end-call, letting an
/// in-flight end-of-turn event reach the transport.
pub const END_CALL_GRACE_MS: u64 = 300;

/// Default maximum output tokens per response.
pub const DEFAULT_MAX_TOKENS: u32 = 1024;

/// Default nucleus sampling parameter.
pub const DEFAULT_TOP_P: f32 = 0.9;

/// Default sampling temperature.
pub const DEFAULT_TEMPERATURE: f32 = 0.7;

/// Size in bytes of one outbound audio frame at the input format.
#[inline]
pub fn input_frame_bytes() -> usize {
    (INPUT_SAMPLE_RATE * CHANNEL_COUNT * (SAMPLE_SIZE_BITS / 8) * AUDIO_FRAME_DURATION_MS / 1000)
        as usize
}

// =============================================================================
// Voices
// =============================================================================

/// Voices supported by the speech model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum VoiceId {
    /// Male US English voice (default)
    #[default]
    #[serde(rename = "matthew")]
    Matthew,
    /// Female US English voice
    #[serde(rename = "tiffany")]
    Tiffany,
    /// Female British English voice
    #[serde(rename = "amy")]
    Amy,
}

impl VoiceId {
    /// Convert to the wire voice identifier.
    #[inline]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Matthew => "matthew",
            Self::Tiffany => "tiffany",
            Self::Amy => "amy",
        }
    }

    /// Parse from string, with fallback to the default voice.
    pub fn from_str_or_default(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "matthew" => Self::Matthew,
            "tiffany" => Self::Tiffany,
            "amy" => Self::Amy,
            _ => Self::default(),
        }
    }

}

impl std::fmt::Display for VoiceId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// =============================================================================
// AWS Regions
// =============================================================================

/// AWS regions where the bidirectional speech model is available.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum AwsRegion {
    /// US East (N. Virginia)
    #[default]
    #[serde(rename = "us-east-1")]
    UsEast1,
    /// US West (Oregon)
    #[serde(rename = "us-west-2")]
    UsWest2,
    /// Asia Pacific (Tokyo)
    #[serde(rename = "ap-northeast-1")]
    ApNortheast1,
    /// Europe (Stockholm)
    #[serde(rename = "eu-north-1")]
    EuNorth1,
}

impl AwsRegion {
    /// Convert to AWS region string.
    #[inline]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::UsEast1 => "us-east-1",
            Self::UsWest2 => "us-west-2",
            Self::ApNortheast1 => "ap-northeast-1",
            Self::EuNorth1 => "eu-north-1",
        }
    }

    /// Parse from string, with fallback to default (us-east-1).
    pub fn from_str_or_default(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "us-east-1" => Self::UsEast1,
            "us-west-2" => Self::UsWest2,
            "ap-northeast-1" => Self::ApNortheast1,
            "eu-north-1" => Self::EuNorth1,
            _ => Self::default(),
        }
    }
}

impl std::fmt::Display for AwsRegion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// =============================================================================
// Inference Parameters
// =============================================================================

/// Inference parameters sent with session start.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InferenceConfig {
    /// Maximum output tokens per response
    pub max_tokens: u32,
    /// Nucleus sampling parameter (0.0 to 1.0)
    pub top_p: f32,
    /// Sampling temperature (0.0 to 1.0)
    pub temperature: f32,
}

impl Default for InferenceConfig {
    fn default() -> Self {
        Self {
            max_tokens: DEFAULT_MAX_TOKENS,
            top_p: DEFAULT_TOP_P,
            temperature: DEFAULT_TEMPERATURE,
        }
    }
}

impl InferenceConfig {
    /// Validate parameter ranges.
    pub fn validate(&self) -> SpeechResult<()> {
        if self.max_tokens == 0 {
            return Err(SpeechError::Configuration(
                "max_tokens must be greater than 0".to_string(),
            ));
        }
        if !(0.0..=1.0).contains(&self.top_p) {
            return Err(SpeechError::Configuration(format!(
                "top_p must be between 0.0 and 1.0, got {}",
                self.top_p
            )));
        }
        if !(0.0..=1.0).contains(&self.temperature) {
            return Err(SpeechError::Configuration(format!(
                "temperature must be between 0.0 and 1.0, got {}",
                self.temperature
            )));
        }
        Ok(())
    }
}

// =============================================================================
// History
// =============================================================================

/// One prior conversation turn supplied by the caller.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryMessage {
    /// Speaker role
    pub role: Role,
    /// Message text
    pub content: String,
}

impl HistoryMessage {
    /// Convenience constructor.
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }
}

// =============================================================================
// Audio Payload
// =============================================================================

/// Caller-supplied audio, either raw PCM bytes or base64 text.
#[derive(Debug, Clone)]
pub enum AudioPayload {
    /// Raw PCM 16-bit little-endian bytes
    Raw(Bytes),
    /// Base64-encoded PCM bytes
    Base64(String),
}

// =============================================================================
// Call Control
// =============================================================================

/// Control signal carried by the session config.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CallControl {
    /// Open the session and keep it alive for live audio
    #[default]
    StartCall,
    /// Signal an already-running session to finish
    EndCall,
}

// =============================================================================
// Explicit Credentials
// =============================================================================

/// Explicit AWS credentials; when absent the default provider chain is used.
#[derive(Debug, Clone, Default)]
pub struct ExplicitCredentials {
    /// AWS access key id
    pub access_key_id: String,
    /// AWS secret access key
    pub secret_access_key: String,
    /// Optional session token
    pub session_token: Option<String>,
}

// =============================================================================
// Live Transcript Callback
// =============================================================================

/// One transcript segment emitted while the session runs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranscriptSegment {
    /// Transcribed or generated text
    pub text: String,
    /// Speaker role
    pub role: Role,
    /// Whether the segment is final for its content stream
    pub is_final: bool,
    /// Content identifier from the remote side
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content_id: Option<String>,
}

/// Callback type for incremental transcript results.
pub type TranscriptCallback =
    Arc<dyn Fn(TranscriptSegment) -> Pin<Box<dyn Future<Output = ()> + Send>> + Send + Sync>;

// =============================================================================
// Session Configuration
// =============================================================================

/// Configuration for one speech session.
#[derive(Clone, Default)]
pub struct SessionConfig {
    /// System prompt sent before history
    pub system_prompt: Option<String>,

    /// Voice for generated speech
    pub voice: VoiceId,

    /// Inference parameters
    pub inference: InferenceConfig,

    /// Prior conversation turns (truncated before sending)
    pub history: Vec<HistoryMessage>,

    /// Optional audio sent directly after initialization
    pub direct_audio: Option<AudioPayload>,

    /// Tool declarations and dispatch table
    pub tools: Option<ToolConfig>,

    /// Call control signal
    pub control: CallControl,

    /// Cap on history messages (most recent kept)
    pub max_history_messages: usize,

    /// Cap on total history characters
    pub max_history_chars: usize,

    /// AWS region hosting the model
    pub region: AwsRegion,

    /// Explicit credentials; default provider chain when absent
    pub credentials: Option<ExplicitCredentials>,

    /// Callback for incremental transcripts
    pub transcript_callback: Option<TranscriptCallback>,
}

impl std::fmt::Debug for SessionConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionConfig")
            .field("system_prompt", &self.system_prompt)
            .field("voice", &self.voice)
            .field("inference", &self.inference)
            .field("history_len", &self.history.len())
            .field("has_direct_audio", &self.direct_audio.is_some())
            .field("has_tools", &self.tools.is_some())
            .field("control", &self.control)
            .field("region", &self.region)
            .finish_non_exhaustive()
    }
}

impl SessionConfig {
    /// Validate the configuration before any session work.
    pub fn validate(&self) -> SpeechResult<()> {
        self.inference.validate()
    }

    /// History message cap; zero means "use the default".
    pub fn max_history_messages(&self) -> usize {
        if self.max_history_messages == 0 {
            DEFAULT_MAX_HISTORY_MESSAGES
        } else {
            self.max_history_messages
        }
    }

    /// History character cap; zero means "use the default".
    pub fn max_history_chars(&self) -> usize {
        if self.max_history_chars == 0 {
            DEFAULT_MAX_HISTORY_CHARS
        } else {
            self.max_history_chars
        }
    }
}

// =============================================================================
// Session Metadata
// =============================================================================

/// Correlation identifiers carried alongside a session.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SessionMetadata {
    /// Chat identifier
    pub chat_id: Option<String>,
    /// Conversation identifier
    pub conversation_id: Option<String>,
    /// User identifier
    pub user_id: Option<String>,
    /// Workflow identifier
    pub workflow_id: Option<String>,
}

impl SessionMetadata {
    /// Derive the registry key for this session.
    ///
    /// Prefers the chat id, then conversation and workflow ids, and finally
    /// a fresh UUID so headless callers still get a usable key.
    pub fn session_key(&self) -> String {
        self.chat_id
            .clone()
            .or_else(|| self.conversation_id.clone())
            .or_else(|| self.workflow_id.clone())
            .unwrap_or_else(|| uuid::Uuid::new_v4().to_string())
    }
}

// =============================================================================
// Session Statistics
// =============================================================================

/// Aggregated results returned when a session finishes.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SessionStats {
    /// Total tokens reported by the remote side
    pub total_tokens: u64,
    /// Input tokens
    pub input_tokens: u64,
    /// Output tokens
    pub output_tokens: u64,
    /// Number of audio chunks relayed downstream
    pub chunk_count: u64,
    /// Full interleaved text output
    pub text: String,
    /// Last user utterance transcription
    pub transcription: String,
    /// Last assistant response text
    pub assistant_response: String,
    /// True when results are partial (e.g. after an input timeout)
    pub estimated: bool,
}
