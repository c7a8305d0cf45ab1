//! Response accumulators for one session.
//!
//! The inbound pump owns one [`ResponseProcessor`] and feeds it every parsed
//! event in arrival order, so all state transitions here are single-threaded.
//! The processor keeps derived state only: text buffers per role, usage
//! totals, audio relay state. Tool-use and completion notifications flow to
//! the orchestrator over channels.
//!
//! Role state machine: a TEXT contentStart sets the active role and clears
//! that role's buffer, so an interrupted prior turn never bleeds into a new
//! one. Audio content never clears text buffers; it brackets the relay's
//! SpeechStarted / SpeechEnded signaling instead.

use std::sync::Arc;

use base64::prelude::*;
use bytes::Bytes;
use tokio::sync::mpsc;

use super::channel::{AudioChannel, ChannelState};
use super::config::{SessionStats, TranscriptCallback, TranscriptSegment};
use super::error::SpeechError;
use super::events::{
    CompletionEndPayload, ContentType, InboundEvent, Role, StopReason, ToolUsePayload,
};

/// Accumulates one session's inbound traffic into final stats and side effects.
pub struct ResponseProcessor {
    session_id: String,
    channel: Arc<dyn AudioChannel>,
    transcript_callback: Option<TranscriptCallback>,
    tool_tx: mpsc::Sender<ToolUsePayload>,
    completion_tx: mpsc::Sender<CompletionEndPayload>,

    current_role: Option<Role>,
    current_content_type: Option<ContentType>,
    transcription: String,
    assistant_response: String,
    text: String,
    chunk_count: u64,
    input_tokens: u64,
    output_tokens: u64,
    total_tokens: u64,
    speech_active: bool,
    estimated: bool,
}

impl ResponseProcessor {
    pub fn new(
        session_id: String,
        channel: Arc<dyn AudioChannel>,
        transcript_callback: Option<TranscriptCallback>,
        tool_tx: mpsc::Sender<ToolUsePayload>,
        completion_tx: mpsc::Sender<CompletionEndPayload>,
    ) -> Self {
        Self {
            session_id,
            channel,
            transcript_callback,
            tool_tx,
            completion_tx,
            current_role: None,
            current_content_type: None,
            transcription: String::new(),
            assistant_response: String::new(),
            text: String::new(),
            chunk_count: 0,
            input_tokens: 0,
            output_tokens: 0,
            total_tokens: 0,
            speech_active: false,
            estimated: false,
        }
    }

    /// Process one inbound event. Exception frames never reach this method;
    /// the pump routes them to [`handle_error`](Self::handle_error).
    pub async fn handle_event(&mut self, event: InboundEvent) {
        match event {
            InboundEvent::CompletionStart(start) => {
                tracing::debug!(
                    session_id = %self.session_id,
                    completion_id = start.completion_id.as_deref().unwrap_or(""),
                    "Turn started"
                );
            }
            InboundEvent::ContentStart(start) => {
                self.current_role = Some(start.role);
                self.current_content_type = Some(start.content_type);
                match (start.content_type, start.role) {
                    (ContentType::Text, Role::Assistant) => {
                        // Interrupted or partial prior turns must not bleed in
                        self.assistant_response.clear();
                    }
                    (ContentType::Text, Role::User) => {
                        self.transcription.clear();
                    }
                    (ContentType::Audio, _) => {
                        self.speech_active = true;
                        self.publish_state(ChannelState::SpeechStarted).await;
                    }
                    _ => {}
                }
            }
            InboundEvent::TextOutput(output) => {
                let role = output.role.or(self.current_role).unwrap_or(Role::Assistant);
                self.text.push_str(&output.content);
                match role {
                    Role::User => {
                        self.transcription.push_str(&output.content);
                        self.emit_transcript(TranscriptSegment {
                            text: output.content,
                            role: Role::User,
                            is_final: false,
                            content_id: output.content_id,
                        })
                        .await;
                    }
                    Role::Assistant => {
                        self.assistant_response.push_str(&output.content);
                    }
                    _ => {}
                }
            }
            InboundEvent::AudioOutput(output) => {
                let chunk = match BASE64_STANDARD.decode(output.content.as_bytes()) {
                    Ok(bytes) => Bytes::from(bytes),
                    Err(e) => {
                        tracing::warn!(
                            session_id = %self.session_id,
                            error = %e,
                            "Skipping undecodable audio chunk"
                        );
                        return;
                    }
                };
                self.chunk_count += 1;
                // Awaited so a slow consumer throttles the remote stream
                if let Err(e) = self
                    .channel
                    .publish_audio(chunk, ChannelState::SpeechStreaming)
                    .await
                {
                    tracing::warn!(session_id = %self.session_id, error = %e, "Audio publish failed");
                }
            }
            InboundEvent::ContentEnd(end) => {
                let content_type = end.content_type.or(self.current_content_type);
                let interrupted = end.stop_reason == StopReason::Interrupted;
                tracing::debug!(
                    session_id = %self.session_id,
                    stop_reason = ?end.stop_reason,
                    "Content stream ended"
                );

                if self.speech_active
                    && (content_type == Some(ContentType::Audio) || interrupted)
                {
                    self.speech_active = false;
                    self.publish_state(ChannelState::SpeechEnded).await;
                }

                if content_type == Some(ContentType::Text)
                    && self.current_role == Some(Role::User)
                    && !self.transcription.is_empty()
                {
                    self.emit_transcript(TranscriptSegment {
                        text: self.transcription.clone(),
                        role: Role::User,
                        is_final: true,
                        content_id: end.content_id,
                    })
                    .await;
                }

                self.current_role = None;
                self.current_content_type = None;
            }
            InboundEvent::ToolUse(tool_use) => {
                tracing::info!(
                    session_id = %self.session_id,
                    tool = %tool_use.tool_name,
                    tool_use_id = %tool_use.tool_use_id,
                    "Tool invocation requested"
                );
                self.publish_state(ChannelState::ToolInUse).await;
                if self.tool_tx.send(tool_use).await.is_err() {
                    tracing::warn!(session_id = %self.session_id, "Tool channel closed; dropping request");
                }
            }
            InboundEvent::UsageEvent(usage) => {
                // Running totals, not deltas
                self.input_tokens = usage.total_input_tokens;
                self.output_tokens = usage.total_output_tokens;
                self.total_tokens = usage.total_tokens;
            }
            InboundEvent::CompletionEnd(end) => {
                tracing::debug!(
                    session_id = %self.session_id,
                    stop_reason = ?end.stop_reason,
                    "Turn finished"
                );
                if self.completion_tx.send(end).await.is_err() {
                    tracing::warn!(session_id = %self.session_id, "Completion channel closed");
                }
            }
            InboundEvent::ModelStreamErrorException(_)
            | InboundEvent::InternalServerException(_)
            | InboundEvent::ValidationException(_) => {
                tracing::warn!(
                    session_id = %self.session_id,
                    event = event.tag(),
                    "Exception frame reached the accumulator"
                );
            }
        }
    }

    /// Drive the accumulators to a consistent state after a stream error.
    ///
    /// Always flushes an in-flight SpeechEnded so downstream playback is not
    /// left waiting. An input timeout additionally acts as a synthesized
    /// normal content end and marks the results as estimated.
    pub async fn handle_error(&mut self, error: &SpeechError) {
        if self.speech_active {
            self.speech_active = false;
            self.publish_state(ChannelState::SpeechEnded).await;
        }

        if error.is_input_timeout() {
            tracing::info!(
                session_id = %self.session_id,
                "Remote gave up waiting for input; closing the turn with partial results"
            );
            self.estimated = true;
            if self.current_role == Some(Role::User) && !self.transcription.is_empty() {
                self.emit_transcript(TranscriptSegment {
                    text: self.transcription.clone(),
                    role: Role::User,
                    is_final: true,
                    content_id: None,
                })
                .await;
            }
            self.current_role = None;
            self.current_content_type = None;
        }
    }

    /// Mark the final results as partial.
    pub fn mark_estimated(&mut self) {
        self.estimated = true;
    }

    /// Final aggregate for the caller.
    pub fn into_stats(self) -> SessionStats {
        SessionStats {
            total_tokens: self.total_tokens,
            input_tokens: self.input_tokens,
            output_tokens: self.output_tokens,
            chunk_count: self.chunk_count,
            text: self.text,
            transcription: self.transcription,
            assistant_response: self.assistant_response,
            estimated: self.estimated,
        }
    }

    async fn publish_state(&self, state: ChannelState) {
        if let Err(e) = self.channel.publish_state(state).await {
            tracing::warn!(session_id = %self.session_id, error = %e, state = state.as_str(), "State publish failed");
        }
    }

    async fn emit_transcript(&self, segment: TranscriptSegment) {
        if let Some(callback) = &self.transcript_callback {
            callback(segment).await;
        }
    }
}
