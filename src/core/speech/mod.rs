//! Bidirectional streaming speech session module.
//!
//! This module implements the session protocol engine for a real-time
//! speech-to-speech model: outbound event construction and queueing, inbound
//! event parsing and accumulation, tool round trips, and session lifecycle
//! orchestration over one duplex stream.
//!
//! # Architecture
//!
//! - `OutboundQueue` buffers protocol events and feeds the transport lazily
//! - `builder` constructs every outbound frame shape
//! - `router` parses inbound frames and classifies exception frames
//! - `ResponseProcessor` accumulates text, relays audio, tracks usage
//! - `SessionEngine` orchestrates the whole session lifecycle
//! - `DuplexTransport` and `AudioChannel` are the swappable boundaries
//!
//! # Audio Format
//!
//! - Input: PCM 16-bit signed little-endian mono at 16kHz, 30ms frames
//! - Output: PCM 16-bit signed little-endian mono at 24kHz
//!
//! # Example
//!
//! ```rust,ignore
//! use sonic_stream::core::speech::{
//!     SessionConfig, SessionEngine, SessionMetadata, SessionRegistry, VoiceId,
//! };
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() {
//!     let registry = SessionRegistry::new();
//!     let engine = SessionEngine::new(transport, registry.clone());
//!
//!     let config = SessionConfig {
//!         system_prompt: Some("You are a helpful voice assistant.".to_string()),
//!         voice: VoiceId::Tiffany,
//!         ..Default::default()
//!     };
//!     let metadata = SessionMetadata {
//!         chat_id: Some("chat-42".to_string()),
//!         ..Default::default()
//!     };
//!
//!     let stats = engine.run(config, metadata).await.unwrap();
//!     println!("assistant said: {}", stats.assistant_response);
//! }
//! ```

pub mod builder;
pub mod channel;
pub mod config;
pub mod credentials;
pub mod error;
pub mod events;
pub mod processor;
pub mod queue;
pub mod router;
pub mod session;
pub mod tools;
pub mod transport;

pub use channel::{AudioChannel, ChannelState, NullAudioChannel};
pub use config::{
    AudioPayload, AwsRegion, CallControl, ExplicitCredentials, HistoryMessage, InferenceConfig,
    SessionConfig, SessionMetadata, SessionStats, TranscriptCallback, TranscriptSegment, VoiceId,
};
pub use error::{SpeechError, SpeechResult};
pub use events::{ContentType, InboundEvent, OutboundEvent, Role, StopReason};
pub use processor::ResponseProcessor;
pub use queue::OutboundQueue;
pub use session::{SessionEngine, SessionHandle, SessionRegistry};
pub use tools::{ToolConfig, ToolHandler, ToolRegistry, ToolSpec};
pub use transport::{DuplexTransport, FrameStream};
