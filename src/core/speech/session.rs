//! Session lifecycle orchestration.
//!
//! One [`SessionEngine::run`] call drives a whole conversation: credential
//! resolution, registry insertion, the ordered initialization sequence, live
//! audio forwarding, tool round trips, and teardown. Per session, three
//! concurrent pieces cooperate: the outbound queue feeding the transport, an
//! inbound pump task feeding the accumulators, and the orchestrator's select
//! loop. They communicate only through the queue and message channels.
//!
//! A completionEnd does not end the session; turns repeat on the open stream
//! until an explicit end-call signal or a terminal stream error.

use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use dashmap::DashMap;
use futures_util::StreamExt;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::Instrument;

use super::builder;
use super::channel::{AudioChannel, ChannelState, NullAudioChannel};
use super::config::{
    AudioPayload, CallControl, END_CALL_GRACE_MS, SessionConfig, SessionMetadata, SessionStats,
};
use super::credentials::{self, ResolvedCredentials};
use super::error::{SpeechError, SpeechResult};
use super::events::Role;
use super::processor::ResponseProcessor;
use super::queue::OutboundQueue;
use super::router;
use super::tools::ToolRegistry;
use super::transport::{DuplexTransport, FrameStream};

// =============================================================================
// Session Handle & Registry
// =============================================================================

/// Caller-facing handle to a running session.
#[derive(Clone)]
pub struct SessionHandle {
    audio_tx: mpsc::Sender<Bytes>,
    cancel: CancellationToken,
}

impl SessionHandle {
    /// Forward one live audio frame into the session.
    pub async fn send_audio(&self, frame: Bytes) -> SpeechResult<()> {
        self.audio_tx
            .send(frame)
            .await
            .map_err(|_| SpeechError::QueueClosed)
    }

    /// Signal the session to finish. Safe to call more than once.
    pub fn end_call(&self) {
        self.cancel.cancel();
    }
}

/// In-memory registry of running sessions, keyed by session id.
///
/// Injected into the engine by the caller; access is brief per operation.
#[derive(Default)]
pub struct SessionRegistry {
    sessions: DashMap<String, SessionHandle>,
}

impl SessionRegistry {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Look up the handle for a running session.
    pub fn handle(&self, session_id: &str) -> Option<SessionHandle> {
        self.sessions.get(session_id).map(|h| h.clone())
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    fn insert(&self, session_id: &str, handle: SessionHandle) -> SpeechResult<()> {
        match self.sessions.entry(session_id.to_string()) {
            dashmap::mapref::entry::Entry::Occupied(_) => {
                Err(SpeechError::SessionActive(session_id.to_string()))
            }
            dashmap::mapref::entry::Entry::Vacant(entry) => {
                entry.insert(handle);
                Ok(())
            }
        }
    }

    fn remove(&self, session_id: &str) {
        self.sessions.remove(session_id);
    }
}

// =============================================================================
// Session Engine
// =============================================================================

/// Drives speech sessions against a duplex transport.
pub struct SessionEngine {
    transport: Arc<dyn DuplexTransport>,
    registry: Arc<SessionRegistry>,
    channel: Arc<dyn AudioChannel>,
}

impl SessionEngine {
    pub fn new(transport: Arc<dyn DuplexTransport>, registry: Arc<SessionRegistry>) -> Self {
        Self {
            transport,
            registry,
            channel: Arc::new(NullAudioChannel),
        }
    }

    /// Attach a downstream audio channel for generated speech and states.
    pub fn with_audio_channel(mut self, channel: Arc<dyn AudioChannel>) -> Self {
        self.channel = channel;
        self
    }

    /// Run one session end to end and return its aggregated results.
    ///
    /// Configuration and credential failures are returned as errors before
    /// any session work. Once the stream is open, failures finalize into
    /// zeroed stats instead; partial results after an input timeout come back
    /// with `estimated: true`. With [`CallControl::EndCall`] this signals the
    /// already-running session and returns immediately.
    pub async fn run(
        &self,
        config: SessionConfig,
        metadata: SessionMetadata,
    ) -> SpeechResult<SessionStats> {
        config.validate()?;
        let session_id = metadata.session_key();

        if config.control == CallControl::EndCall {
            return match self.registry.handle(&session_id) {
                Some(handle) => {
                    tracing::info!(session_id = %session_id, "End-call signal delivered");
                    handle.end_call();
                    Ok(SessionStats::default())
                }
                None => Err(SpeechError::UnknownSession(session_id)),
            };
        }

        let creds = credentials::resolve(config.region, config.credentials.as_ref()).await?;

        let span = tracing::info_span!("speech_session", session_id = %session_id);
        async {
            let (audio_tx, audio_rx) = mpsc::channel::<Bytes>(64);
            let cancel = CancellationToken::new();
            self.registry.insert(
                &session_id,
                SessionHandle {
                    audio_tx,
                    cancel: cancel.clone(),
                },
            )?;

            let result = self.drive(config, &session_id, creds, audio_rx, cancel).await;
            self.registry.remove(&session_id);

            match result {
                Ok(stats) => {
                    tracing::info!(
                        total_tokens = stats.total_tokens,
                        chunks = stats.chunk_count,
                        estimated = stats.estimated,
                        "Session finished"
                    );
                    self.publish_state(ChannelState::SessionEnded).await;
                    Ok(stats)
                }
                Err(e) => {
                    tracing::error!(error = %e, retryable = e.is_retryable(), "Session failed");
                    self.publish_state(ChannelState::SessionError).await;
                    Ok(SessionStats::default())
                }
            }
        }
        .instrument(span)
        .await
    }

    async fn drive(
        &self,
        config: SessionConfig,
        session_id: &str,
        creds: ResolvedCredentials,
        mut audio_rx: mpsc::Receiver<Bytes>,
        cancel: CancellationToken,
    ) -> SpeechResult<SessionStats> {
        let queue = OutboundQueue::new();
        let (tool_tx, mut tool_rx) = mpsc::channel(16);
        let (completion_tx, mut completion_rx) = mpsc::channel(16);

        self.publish_state(ChannelState::SessionStarting).await;
        let outbound: FrameStream = Box::pin(queue.clone().into_frame_stream());
        let inbound = self.transport.open(config.region, creds, outbound).await?;

        // Initialization sequence, strictly ordered
        let prompt_name = uuid::Uuid::new_v4().to_string();
        queue.enqueue(builder::session_start(&config.inference)).await?;
        let wire_tools = config.tools.as_ref().map(|t| t.wire_specs());
        queue
            .enqueue(builder::prompt_start(&prompt_name, config.voice, wire_tools))
            .await?;

        if let Some(system) = &config.system_prompt {
            queue
                .enqueue_all(builder::text_content(&prompt_name, Role::System, system, false))
                .await?;
        }

        let history = builder::truncate_history(
            &config.history,
            config.max_history_messages(),
            config.max_history_chars(),
        );
        for message in &history {
            queue
                .enqueue_all(builder::text_content(
                    &prompt_name,
                    message.role,
                    &message.content,
                    false,
                ))
                .await?;
        }

        if let Some(audio) = &config.direct_audio {
            let frames = builder::frame_audio(audio)?;
            let (name, start) = builder::audio_content_start(&prompt_name, false);
            queue.enqueue(start).await?;
            for frame in &frames {
                queue
                    .enqueue(builder::audio_input(&prompt_name, &name, frame))
                    .await?;
            }
            queue.enqueue(builder::content_end(&prompt_name, &name)).await?;
        }

        // Live audio content stays open for the duration of the call
        let (live_name, live_start) = builder::audio_content_start(&prompt_name, true);
        queue.enqueue(live_start).await?;
        self.publish_state(ChannelState::SessionReady).await;
        tracing::info!(session_id = %session_id, "Session ready for live audio");

        let processor = ResponseProcessor::new(
            session_id.to_string(),
            self.channel.clone(),
            config.transcript_callback.clone(),
            tool_tx,
            completion_tx,
        );
        let mut pump = spawn_inbound_pump(inbound, processor, queue.clone());

        let tool_registry = config.tools.as_ref().map(|t| t.registry.clone());
        let mut ending = false;
        let joined = loop {
            tokio::select! {
                result = &mut pump => break result,
                Some(frame) = audio_rx.recv(), if !ending => {
                    // Live input goes through the same real-time framing as direct audio
                    if let Ok(pieces) = builder::frame_audio(&AudioPayload::Raw(frame)) {
                        for piece in &pieces {
                            if queue
                                .enqueue(builder::audio_input(&prompt_name, &live_name, piece))
                                .await
                                .is_err()
                            {
                                tracing::warn!("Dropping live audio; outbound queue closed");
                                break;
                            }
                        }
                    }
                }
                Some(tool_use) = tool_rx.recv() => {
                    let result_json = dispatch_tool(
                        tool_registry.as_deref(),
                        &tool_use.tool_name,
                        &tool_use.content,
                    )
                    .await;
                    if queue
                        .enqueue_all(builder::tool_result_content(
                            &prompt_name,
                            &tool_use.tool_use_id,
                            &result_json,
                        ))
                        .await
                        .is_err()
                    {
                        tracing::warn!(
                            tool_use_id = %tool_use.tool_use_id,
                            "Could not return tool result; outbound queue closed"
                        );
                    }
                }
                Some(end) = completion_rx.recv() => {
                    // Turns repeat on the open stream
                    tracing::debug!(stop_reason = ?end.stop_reason, "Turn complete; session stays open");
                }
                _ = cancel.cancelled(), if !ending => {
                    ending = true;
                    tracing::info!(session_id = %session_id, "Ending call");
                    let _ = queue.enqueue(builder::content_end(&prompt_name, &live_name)).await;
                    let _ = queue.enqueue(builder::prompt_end(&prompt_name)).await;
                    let _ = queue.enqueue(builder::session_end()).await;
                    // Grace delay so the end-of-turn events reach the transport
                    tokio::time::sleep(Duration::from_millis(END_CALL_GRACE_MS)).await;
                    queue.close().await;
                }
            }
        };

        queue.close().await;
        let (mut processor, pump_result) = joined
            .map_err(|e| SpeechError::Transport(format!("Inbound pump task failed: {}", e)))?;

        match pump_result {
            Ok(()) => Ok(processor.into_stats()),
            Err(e) if e.is_input_timeout() => {
                processor.mark_estimated();
                Ok(processor.into_stats())
            }
            Err(e) => Err(e),
        }
    }

    async fn publish_state(&self, state: ChannelState) {
        if let Err(e) = self.channel.publish_state(state).await {
            tracing::warn!(error = %e, state = state.as_str(), "State publish failed");
        }
    }
}

/// Resolve one tool invocation into a result JSON string.
async fn dispatch_tool(registry: Option<&ToolRegistry>, name: &str, input: &str) -> String {
    match registry {
        Some(registry) => registry.dispatch(name, input).await,
        None => {
            tracing::warn!(tool = name, "Tool requested but no dispatch table configured");
            serde_json::json!({
                "error": "No handler registered for tool",
                "toolName": name,
            })
            .to_string()
        }
    }
}

/// Run the inbound side: parse each frame, route exceptions, feed the
/// accumulators. Returns the processor so final stats can be collected.
fn spawn_inbound_pump(
    mut inbound: FrameStream,
    mut processor: ResponseProcessor,
    queue: Arc<OutboundQueue>,
) -> JoinHandle<(ResponseProcessor, SpeechResult<()>)> {
    tokio::spawn(async move {
        while let Some(item) = inbound.next().await {
            let frame = match item {
                Ok(frame) => frame,
                Err(e) => {
                    processor.handle_error(&e).await;
                    if !e.keeps_queue_open() {
                        queue.close().await;
                    }
                    return (processor, Err(e));
                }
            };

            let event = match router::parse_frame(&frame) {
                Ok(Some(event)) => event,
                Ok(None) => continue,
                Err(e) => {
                    // Structural errors are fatal to the frame only
                    tracing::warn!(error = %e, "Skipping malformed inbound frame");
                    continue;
                }
            };

            if let Some(err) = router::exception_error(&event) {
                processor.handle_error(&err).await;
                if err.keeps_queue_open() {
                    tracing::warn!(error = %err, "Continuing after transient model stream error");
                    continue;
                }
                queue.close().await;
                return (processor, Err(err));
            }

            processor.handle_event(event).await;
        }
        (processor, Ok(()))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dummy_handle() -> SessionHandle {
        let (audio_tx, _rx) = mpsc::channel(1);
        SessionHandle {
            audio_tx,
            cancel: CancellationToken::new(),
        }
    }

    #[test]
    fn test_registry_rejects_duplicate_ids() {
        let registry = SessionRegistry::new();
        registry.insert("s1", dummy_handle()).unwrap();
        let result = registry.insert("s1", dummy_handle());
        assert!(matches!(result, Err(SpeechError::SessionActive(_))));

        registry.remove("s1");
        assert!(registry.insert("s1", dummy_handle()).is_ok());
    }

    #[test]
    fn test_registry_lookup_and_remove() {
        let registry = SessionRegistry::new();
        assert!(registry.handle("missing").is_none());
        assert!(registry.is_empty());

        registry.insert("s1", dummy_handle()).unwrap();
        assert!(registry.handle("s1").is_some());
        assert_eq!(registry.len(), 1);

        registry.remove("s1");
        assert!(registry.handle("s1").is_none());
    }

    #[tokio::test]
    async fn test_end_call_is_idempotent() {
        let handle = dummy_handle();
        handle.end_call();
        handle.end_call();
        assert!(handle.cancel.is_cancelled());
    }

    #[tokio::test]
    async fn test_send_audio_after_session_gone() {
        let (audio_tx, rx) = mpsc::channel(1);
        let handle = SessionHandle {
            audio_tx,
            cancel: CancellationToken::new(),
        };
        drop(rx);
        let result = handle.send_audio(Bytes::from_static(b"pcm")).await;
        assert!(matches!(result, Err(SpeechError::QueueClosed)));
    }
}
