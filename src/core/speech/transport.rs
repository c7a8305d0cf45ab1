//! Duplex transport boundary.
//!
//! The remote model is reached through one duplex call: the engine hands over
//! a lazy stream of serialized outbound frames and receives a stream of
//! inbound frames back. Everything behind that call (signing, HTTP/2 event
//! streams, the concrete cloud client) lives in the transport implementation.

use async_trait::async_trait;
use bytes::Bytes;
use futures::Stream;
use std::pin::Pin;

use super::config::AwsRegion;
use super::credentials::ResolvedCredentials;
use super::error::SpeechResult;

/// One direction of frame traffic. Each item is a complete JSON frame.
pub type FrameStream = Pin<Box<dyn Stream<Item = SpeechResult<Bytes>> + Send>>;

/// Duplex call against the remote speech model.
#[async_trait]
pub trait DuplexTransport: Send + Sync {
    /// Open the bidirectional stream.
    ///
    /// `outbound` is consumed lazily by the transport; the returned stream
    /// yields inbound frames until the remote side finishes or fails.
    /// Transport-level failures are classified into the session error
    /// taxonomy by the implementation.
    async fn open(
        &self,
        region: AwsRegion,
        credentials: ResolvedCredentials,
        outbound: FrameStream,
    ) -> SpeechResult<FrameStream>;
}
