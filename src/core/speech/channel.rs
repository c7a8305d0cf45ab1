//! Downstream audio channel boundary.
//!
//! The engine pushes generated audio and lifecycle states to whatever carries
//! them to the end client. Publishing is awaited on purpose: a slow consumer
//! throttles the whole session instead of forcing unbounded buffering.

use async_trait::async_trait;
use bytes::Bytes;

use super::error::SpeechResult;

/// Lifecycle states published to the downstream channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelState {
    /// Session is being set up
    SessionStarting,
    /// Session is live and accepting audio
    SessionReady,
    /// Session finished normally
    SessionEnded,
    /// Session finished with an error
    SessionError,
    /// Model began speaking
    SpeechStarted,
    /// Model audio chunk in flight
    SpeechStreaming,
    /// Model stopped speaking; playback buffers can flush
    SpeechEnded,
    /// A tool call is in flight
    ToolInUse,
}

impl ChannelState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::SessionStarting => "session_starting",
            Self::SessionReady => "session_ready",
            Self::SessionEnded => "session_ended",
            Self::SessionError => "session_error",
            Self::SpeechStarted => "speech_started",
            Self::SpeechStreaming => "speech_streaming",
            Self::SpeechEnded => "speech_ended",
            Self::ToolInUse => "tool_in_use",
        }
    }
}

impl std::fmt::Display for ChannelState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Transport-agnostic sink for generated audio and session state.
#[async_trait]
pub trait AudioChannel: Send + Sync {
    /// Publish one decoded audio chunk with its accompanying state.
    async fn publish_audio(&self, chunk: Bytes, state: ChannelState) -> SpeechResult<()>;

    /// Publish a state transition without audio.
    async fn publish_state(&self, state: ChannelState) -> SpeechResult<()>;
}

/// Channel that drops everything, for callers without a downstream consumer.
pub struct NullAudioChannel;

#[async_trait]
impl AudioChannel for NullAudioChannel {
    async fn publish_audio(&self, _chunk: Bytes, _state: ChannelState) -> SpeechResult<()> {
        Ok(())
    }

    async fn publish_state(&self, state: ChannelState) -> SpeechResult<()> {
        tracing::trace!(state = state.as_str(), "Discarding state publish");
        Ok(())
    }
}
