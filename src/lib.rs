pub mod core;

// Re-export commonly used items for convenience
pub use crate::core::*;
pub use crate::core::speech::{FrameStream, NullAudioChannel, Role, StopReason, TranscriptSegment};
