pub mod speech;

// Re-export commonly used types for convenience
pub use speech::{
    AudioChannel, AudioPayload, AwsRegion, CallControl, ChannelState, DuplexTransport,
    ExplicitCredentials, HistoryMessage, InferenceConfig, SessionConfig, SessionEngine,
    SessionHandle, SessionMetadata, SessionRegistry, SessionStats, SpeechError, SpeechResult,
    ToolConfig, ToolRegistry, ToolSpec, VoiceId,
};
