//! Scripted mock duplex transport.
//!
//! Simulates the remote speech model: a script of steps interleaves waiting
//! for specific outbound frames with emitting inbound frames or stream
//! errors. Every outbound frame is recorded for assertions. After the script
//! runs out, remaining outbound traffic is drained until the engine closes
//! its queue, then the inbound stream ends.

// Allow dead code in test infrastructure - these utilities may be used by future tests
#![allow(dead_code)]

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use futures::StreamExt;
use serde_json::Value;
use tokio::sync::mpsc;

use sonic_stream::core::speech::config::AwsRegion;
use sonic_stream::core::speech::credentials::ResolvedCredentials;
use sonic_stream::core::speech::error::{SpeechError, SpeechResult};
use sonic_stream::core::speech::transport::{DuplexTransport, FrameStream};

/// One step of the scripted exchange.
pub enum ScriptStep {
    /// Consume outbound frames until one with this top-level key arrives
    ExpectOutbound(&'static str),
    /// Emit one inbound frame
    Emit(Value),
    /// Emit one inbound stream error
    Fail(SpeechError),
}

pub struct MockTransport {
    script: Mutex<Option<Vec<ScriptStep>>>,
    open_error: Mutex<Option<SpeechError>>,
    records: Arc<Mutex<Vec<Value>>>,
}

impl MockTransport {
    /// Transport that plays the given script once.
    pub fn new(script: Vec<ScriptStep>) -> Arc<Self> {
        Arc::new(Self {
            script: Mutex::new(Some(script)),
            open_error: Mutex::new(None),
            records: Arc::new(Mutex::new(Vec::new())),
        })
    }

    /// Transport whose open call fails with the given error.
    pub fn failing(error: SpeechError) -> Arc<Self> {
        Arc::new(Self {
            script: Mutex::new(None),
            open_error: Mutex::new(Some(error)),
            records: Arc::new(Mutex::new(Vec::new())),
        })
    }

    /// All outbound frames recorded so far, in send order.
    pub fn recorded(&self) -> Vec<Value> {
        self.records.lock().unwrap().clone()
    }

    /// Top-level event keys of all recorded frames, in send order.
    pub fn outbound_tags(&self) -> Vec<String> {
        self.recorded().iter().map(frame_tag).collect()
    }

    /// Wait until a frame with the given event key has been recorded.
    pub async fn wait_for_outbound(&self, tag: &str) {
        self.wait_for_outbound_count(tag, 1).await;
    }

    /// Wait until at least `count` frames with the given key are recorded.
    pub async fn wait_for_outbound_count(&self, tag: &str, count: usize) {
        let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
        loop {
            if self.outbound_tags().iter().filter(|t| *t == tag).count() >= count {
                return;
            }
            if tokio::time::Instant::now() > deadline {
                panic!("Timed out waiting for {} outbound {} frame(s)", count, tag);
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    }
}

/// Top-level event key of one frame.
pub fn frame_tag(frame: &Value) -> String {
    frame
        .as_object()
        .and_then(|obj| obj.keys().next())
        .cloned()
        .unwrap_or_default()
}

#[async_trait]
impl DuplexTransport for MockTransport {
    async fn open(
        &self,
        _region: AwsRegion,
        _credentials: ResolvedCredentials,
        mut outbound: FrameStream,
    ) -> SpeechResult<FrameStream> {
        if let Some(error) = self.open_error.lock().unwrap().take() {
            return Err(error);
        }

        let script = self.script.lock().unwrap().take().unwrap_or_default();
        let records = self.records.clone();
        let (tx, mut rx) = mpsc::channel::<SpeechResult<Bytes>>(32);

        tokio::spawn(async move {
            for step in script {
                match step {
                    ScriptStep::ExpectOutbound(tag) => {
                        while let Some(item) = outbound.next().await {
                            let Ok(bytes) = item else { continue };
                            let value: Value = serde_json::from_slice(&bytes).unwrap();
                            let matched = value.get(tag).is_some();
                            records.lock().unwrap().push(value);
                            if matched {
                                break;
                            }
                        }
                    }
                    ScriptStep::Emit(value) => {
                        if tx.send(Ok(Bytes::from(value.to_string()))).await.is_err() {
                            return;
                        }
                    }
                    ScriptStep::Fail(error) => {
                        if tx.send(Err(error)).await.is_err() {
                            return;
                        }
                    }
                }
            }

            // Drain until the engine closes its outbound queue
            while let Some(item) = outbound.next().await {
                if let Ok(bytes) = item {
                    if let Ok(value) = serde_json::from_slice::<Value>(&bytes) {
                        records.lock().unwrap().push(value);
                    }
                }
            }
            drop(tx);
        });

        let inbound = async_stream::stream! {
            while let Some(item) = rx.recv().await {
                yield item;
            }
        };
        Ok(Box::pin(inbound))
    }
}
