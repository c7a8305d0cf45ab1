//! Outbound event builders.
//!
//! Pure construction of every outbound frame shape, plus the two algorithmic
//! pieces that bound request size: history truncation and audio framing.
//! Content names are fresh UUIDs so concurrent content streams within one
//! prompt never collide.

use base64::prelude::*;
use bytes::Bytes;
use uuid::Uuid;

use super::config::{
    AUDIO_FRAME_DURATION_MS, AudioPayload, CHANNEL_COUNT, HistoryMessage, INPUT_SAMPLE_RATE,
    InferenceConfig, OUTPUT_SAMPLE_RATE, SAMPLE_SIZE_BITS, VoiceId, input_frame_bytes,
};
use super::error::{SpeechError, SpeechResult};
use super::events::{
    AudioInputConfig, AudioInputPayload, AudioOutputConfig, ContentEndPayload, ContentStartPayload,
    ContentType, InferenceWire, MediaConfig, OutboundEvent, PromptEndPayload, PromptStartPayload,
    Role, SessionEndPayload, SessionStartPayload, TextInputPayload, ToolConfiguration,
    ToolResultInputConfig, ToolResultPayload, ToolSpecWire,
};

/// Media type for text content.
pub const TEXT_MEDIA_TYPE: &str = "text/plain";

/// Media type for tool content.
pub const TOOL_MEDIA_TYPE: &str = "application/json";

/// Media type for linear PCM audio.
pub const AUDIO_MEDIA_TYPE: &str = "audio/lpcm";

/// Generate a fresh unique content name.
#[inline]
pub fn content_name() -> String {
    Uuid::new_v4().to_string()
}

// =============================================================================
// Session / Prompt Framing
// =============================================================================

/// Build the sessionStart event.
pub fn session_start(inference: &InferenceConfig) -> OutboundEvent {
    OutboundEvent::SessionStart(SessionStartPayload {
        inference_configuration: InferenceWire {
            max_tokens: inference.max_tokens,
            top_p: inference.top_p,
            temperature: inference.temperature,
        },
    })
}

/// Build the promptStart event, declaring output formats and any tools.
pub fn prompt_start(
    prompt_name: &str,
    voice: VoiceId,
    tools: Option<Vec<ToolSpecWire>>,
) -> OutboundEvent {
    let tool_configuration = tools
        .filter(|t| !t.is_empty())
        .map(|tools| ToolConfiguration { tools });

    OutboundEvent::PromptStart(PromptStartPayload {
        prompt_name: prompt_name.to_string(),
        text_output_configuration: MediaConfig {
            media_type: TEXT_MEDIA_TYPE.to_string(),
        },
        audio_output_configuration: AudioOutputConfig {
            media_type: AUDIO_MEDIA_TYPE.to_string(),
            sample_rate_hertz: OUTPUT_SAMPLE_RATE,
            sample_size_bits: SAMPLE_SIZE_BITS,
            channel_count: CHANNEL_COUNT,
            voice_id: voice.as_str().to_string(),
            encoding: "base64".to_string(),
            audio_type: "SPEECH".to_string(),
        },
        tool_use_output_configuration: tool_configuration.is_some().then(|| MediaConfig {
            media_type: TOOL_MEDIA_TYPE.to_string(),
        }),
        tool_configuration,
    })
}

/// Build the promptEnd event.
pub fn prompt_end(prompt_name: &str) -> OutboundEvent {
    OutboundEvent::PromptEnd(PromptEndPayload {
        prompt_name: prompt_name.to_string(),
    })
}

/// Build the sessionEnd event.
pub fn session_end() -> OutboundEvent {
    OutboundEvent::SessionEnd(SessionEndPayload::default())
}

/// Build a contentEnd event.
pub fn content_end(prompt_name: &str, content_name: &str) -> OutboundEvent {
    OutboundEvent::ContentEnd(ContentEndPayload {
        prompt_name: prompt_name.to_string(),
        content_name: content_name.to_string(),
    })
}

// =============================================================================
// Text Content
// =============================================================================

/// Build a complete text content triplet (start / payload / end).
///
/// Used for the system prompt and each history message. A fresh content name
/// brackets each triplet.
pub fn text_content(
    prompt_name: &str,
    role: Role,
    text: &str,
    interactive: bool,
) -> Vec<OutboundEvent> {
    let name = content_name();
    vec![
        OutboundEvent::ContentStart(ContentStartPayload {
            prompt_name: prompt_name.to_string(),
            content_name: name.clone(),
            content_type: ContentType::Text,
            interactive,
            role: Some(role),
            text_input_configuration: Some(MediaConfig {
                media_type: TEXT_MEDIA_TYPE.to_string(),
            }),
            audio_input_configuration: None,
            tool_result_input_configuration: None,
        }),
        OutboundEvent::TextInput(TextInputPayload {
            prompt_name: prompt_name.to_string(),
            content_name: name.clone(),
            content: text.to_string(),
        }),
        OutboundEvent::ContentEnd(ContentEndPayload {
            prompt_name: prompt_name.to_string(),
            content_name: name,
        }),
    ]
}

// =============================================================================
// Audio Content
// =============================================================================

/// Build the contentStart opening an audio content stream.
///
/// Returns the fresh content name so the caller can address frames and the
/// matching contentEnd to it.
pub fn audio_content_start(prompt_name: &str, interactive: bool) -> (String, OutboundEvent) {
    let name = content_name();
    let event = OutboundEvent::ContentStart(ContentStartPayload {
        prompt_name: prompt_name.to_string(),
        content_name: name.clone(),
        content_type: ContentType::Audio,
        interactive,
        role: Some(Role::User),
        text_input_configuration: None,
        audio_input_configuration: Some(AudioInputConfig {
            media_type: AUDIO_MEDIA_TYPE.to_string(),
            sample_rate_hertz: INPUT_SAMPLE_RATE,
            sample_size_bits: SAMPLE_SIZE_BITS,
            channel_count: CHANNEL_COUNT,
            audio_type: "SPEECH".to_string(),
            encoding: "base64".to_string(),
        }),
        tool_result_input_configuration: None,
    });
    (name, event)
}

/// Build one audioInput frame (base64 on the wire).
pub fn audio_input(prompt_name: &str, content_name: &str, frame: &[u8]) -> OutboundEvent {
    OutboundEvent::AudioInput(AudioInputPayload {
        prompt_name: prompt_name.to_string(),
        content_name: content_name.to_string(),
        content: BASE64_STANDARD.encode(frame),
    })
}

/// Decode and split an audio payload into real-time-sized frames.
///
/// Concatenating the returned frames reproduces the decoded input
/// byte-for-byte; only the last frame may be short. Odd byte counts are
/// suspicious for 16-bit PCM and logged, but no data is dropped.
pub fn frame_audio(payload: &AudioPayload) -> SpeechResult<Vec<Bytes>> {
    let data: Bytes = match payload {
        AudioPayload::Raw(bytes) => bytes.clone(),
        AudioPayload::Base64(text) => Bytes::from(
            BASE64_STANDARD
                .decode(text.trim())
                .map_err(|e| SpeechError::Configuration(format!("Invalid base64 audio: {}", e)))?,
        ),
    };

    if data.len() % 2 != 0 {
        tracing::warn!(
            len = data.len(),
            "Audio payload has an odd byte count; expected 16-bit PCM alignment"
        );
    }

    let frame_size = input_frame_bytes();
    let mut frames = Vec::with_capacity(data.len().div_ceil(frame_size));
    let mut offset = 0;
    while offset < data.len() {
        let end = (offset + frame_size).min(data.len());
        frames.push(data.slice(offset..end));
        offset = end;
    }

    tracing::debug!(
        frames = frames.len(),
        frame_ms = AUDIO_FRAME_DURATION_MS,
        total_bytes = data.len(),
        "Framed audio payload"
    );
    Ok(frames)
}

// =============================================================================
// Tool Result Content
// =============================================================================

/// Build a complete tool-result content triplet correlated by tool-use id.
pub fn tool_result_content(
    prompt_name: &str,
    tool_use_id: &str,
    result_json: &str,
) -> Vec<OutboundEvent> {
    let name = content_name();
    vec![
        OutboundEvent::ContentStart(ContentStartPayload {
            prompt_name: prompt_name.to_string(),
            content_name: name.clone(),
            content_type: ContentType::Tool,
            interactive: false,
            role: Some(Role::Tool),
            text_input_configuration: None,
            audio_input_configuration: None,
            tool_result_input_configuration: Some(ToolResultInputConfig {
                tool_use_id: tool_use_id.to_string(),
                content_type: ContentType::Text,
                text_input_configuration: MediaConfig {
                    media_type: TOOL_MEDIA_TYPE.to_string(),
                },
            }),
        }),
        OutboundEvent::ToolResult(ToolResultPayload {
            prompt_name: prompt_name.to_string(),
            content_name: name.clone(),
            content: result_json.to_string(),
        }),
        OutboundEvent::ContentEnd(ContentEndPayload {
            prompt_name: prompt_name.to_string(),
            content_name: name,
        }),
    ]
}

// =============================================================================
// History Truncation
// =============================================================================

/// Truncate history to the caps, keeping the most recent messages.
///
/// Drops oldest-first until both the message cap and the total character cap
/// hold, then hard-truncates a still-oversized single message. Order among
/// retained messages is preserved.
pub fn truncate_history(
    history: &[HistoryMessage],
    max_messages: usize,
    max_chars: usize,
) -> Vec<HistoryMessage> {
    // Most recent N messages first
    let start = history.len().saturating_sub(max_messages);
    let recent = &history[start..];

    // Walk backwards accumulating characters until the cap would be exceeded
    let mut kept: Vec<HistoryMessage> = Vec::with_capacity(recent.len());
    let mut total = 0usize;
    for msg in recent.iter().rev() {
        let len = msg.content.chars().count();
        if total + len > max_chars {
            // A single oversized message still gets sent, hard-truncated
            if kept.is_empty() {
                let budget = max_chars - total;
                let truncated: String = msg.content.chars().take(budget).collect();
                if !truncated.is_empty() {
                    tracing::warn!(
                        original_chars = len,
                        kept_chars = budget,
                        "Hard-truncated oversized history message"
                    );
                    kept.push(HistoryMessage {
                        role: msg.role,
                        content: truncated,
                    });
                }
            }
            break;
        }
        total += len;
        kept.push(msg.clone());
    }

    kept.reverse();
    if kept.len() < history.len() {
        tracing::debug!(
            original = history.len(),
            kept = kept.len(),
            "Truncated conversation history"
        );
    }
    kept
}

#[cfg(test)]
mod tests {
    use super::*;

    fn msg(role: Role, content: &str) -> HistoryMessage {
        HistoryMessage::new(role, content)
    }

    #[test]
    fn test_text_content_triplet_shares_one_name() {
        let events = text_content("p1", Role::System, "be brief", false);
        assert_eq!(events.len(), 3);

        let (start_name, end_name) = match (&events[0], &events[2]) {
            (OutboundEvent::ContentStart(s), OutboundEvent::ContentEnd(e)) => {
                (s.content_name.clone(), e.content_name.clone())
            }
            _ => panic!("Expected start/end bracketing"),
        };
        assert_eq!(start_name, end_name);

        match &events[1] {
            OutboundEvent::TextInput(t) => {
                assert_eq!(t.content_name, start_name);
                assert_eq!(t.content, "be brief");
            }
            other => panic!("Expected textInput, got {}", other.tag()),
        }
    }

    #[test]
    fn test_content_names_unique_across_triplets() {
        let a = text_content("p1", Role::User, "one", false);
        let b = text_content("p1", Role::User, "two", false);
        let name = |e: &OutboundEvent| match e {
            OutboundEvent::ContentStart(s) => s.content_name.clone(),
            _ => unreachable!(),
        };
        assert_ne!(name(&a[0]), name(&b[0]));
    }

    #[test]
    fn test_prompt_start_without_tools() {
        let event = prompt_start("p1", VoiceId::Tiffany, None);
        match event {
            OutboundEvent::PromptStart(p) => {
                assert_eq!(p.prompt_name, "p1");
                assert_eq!(p.audio_output_configuration.voice_id, "tiffany");
                assert_eq!(p.audio_output_configuration.sample_rate_hertz, 24_000);
                assert!(p.tool_configuration.is_none());
                assert!(p.tool_use_output_configuration.is_none());
            }
            other => panic!("Expected promptStart, got {}", other.tag()),
        }
    }

    #[test]
    fn test_frame_audio_reassembles() {
        let frame_size = input_frame_bytes();
        let original: Vec<u8> = (0..frame_size * 2 + 100).map(|i| (i % 251) as u8).collect();
        let frames = frame_audio(&AudioPayload::Raw(Bytes::from(original.clone()))).unwrap();

        assert_eq!(frames.len(), 3);
        assert_eq!(frames[0].len(), frame_size);
        assert_eq!(frames[1].len(), frame_size);
        assert_eq!(frames[2].len(), 100);

        let reassembled: Vec<u8> = frames.iter().flat_map(|f| f.iter().copied()).collect();
        assert_eq!(reassembled, original);
    }

    #[test]
    fn test_frame_audio_base64() {
        let raw = vec![1u8, 2, 3, 4];
        let encoded = BASE64_STANDARD.encode(&raw);
        let frames = frame_audio(&AudioPayload::Base64(encoded)).unwrap();
        assert_eq!(frames.len(), 1);
        assert_eq!(&frames[0][..], &raw[..]);

        let bad = frame_audio(&AudioPayload::Base64("!!not base64!!".to_string()));
        assert!(bad.is_err());
    }

    #[test]
    fn test_truncate_history_message_cap() {
        let history: Vec<_> = (0..10).map(|i| msg(Role::User, &format!("m{}", i))).collect();
        let kept = truncate_history(&history, 3, 1000);
        assert_eq!(kept.len(), 3);
        assert_eq!(kept[0].content, "m7");
        assert_eq!(kept[2].content, "m9");
    }

    #[test]
    fn test_truncate_history_char_cap_drops_oldest() {
        let history = vec![
            msg(Role::User, "aaaaaaaaaa"),      // 10
            msg(Role::Assistant, "bbbbbbbbbb"), // 10
            msg(Role::User, "cccccccccc"),      // 10
        ];
        let kept = truncate_history(&history, 10, 25);
        assert_eq!(kept.len(), 2);
        assert_eq!(kept[0].content, "bbbbbbbbbb");
        assert_eq!(kept[1].content, "cccccccccc");
    }

    #[test]
    fn test_truncate_history_oversized_single_message() {
        let history = vec![msg(Role::User, &"x".repeat(500))];
        let kept = truncate_history(&history, 10, 100);
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].content.chars().count(), 100);
    }

    #[test]
    fn test_truncate_history_within_caps_unchanged() {
        let history = vec![msg(Role::User, "hi"), msg(Role::Assistant, "hello")];
        let kept = truncate_history(&history, 10, 1000);
        assert_eq!(kept.len(), 2);
        assert_eq!(kept[0].content, "hi");
        assert_eq!(kept[1].content, "hello");
    }

    #[test]
    fn test_tool_result_triplet_correlates_by_id() {
        let events = tool_result_content("p1", "tu-42", r#"{"ok":true}"#);
        assert_eq!(events.len(), 3);
        match &events[0] {
            OutboundEvent::ContentStart(s) => {
                let corr = s.tool_result_input_configuration.as_ref().unwrap();
                assert_eq!(corr.tool_use_id, "tu-42");
                assert_eq!(s.content_type, ContentType::Tool);
            }
            other => panic!("Expected contentStart, got {}", other.tag()),
        }
        match &events[1] {
            OutboundEvent::ToolResult(r) => assert_eq!(r.content, r#"{"ok":true}"#),
            other => panic!("Expected toolResult, got {}", other.tag()),
        }
    }
}
