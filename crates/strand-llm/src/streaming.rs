use anyhow::Result;
use bytes::Bytes;
use futures::{Stream, StreamExt};
use reqwest::Response;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::fmt::Display;
use std::pin::Pin;

/// Incremental event from a streaming chat completion.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StreamEvent {
    Reasoning {
        content: String,
    },

    Message {
        content: String,
    },

    Done {
        #[serde(skip_serializing_if = "Option::is_none")]
        finish_reason: Option<String>,
    },
}

/// One `data:` payload of an OpenAI-compatible chat completion stream.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatStreamChunk {
    pub choices: Vec<StreamChoice>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StreamChoice {
    pub delta: Delta,
    pub finish_reason: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Delta {
    pub role: Option<String>,
    pub content: Option<String>,
    /// Reasoning trace delta, emitted by reasoning-capable models on OpenRouter.
    pub reasoning: Option<String>,
}

impl ChatStreamChunk {
    pub fn content(&self) -> Option<&str> {
        self.choices.first().and_then(|c| c.delta.content.as_deref())
    }

    pub fn is_done(&self) -> bool {
        self.choices
            .first()
            .and_then(|c| c.finish_reason.as_ref())
            .is_some()
    }

    fn to_stream_events(&self) -> Vec<StreamEvent> {
        let mut events = Vec::new();

        if let Some(choice) = self.choices.first() {
            if let Some(reasoning) = &choice.delta.reasoning {
                if !reasoning.is_empty() {
                    events.push(StreamEvent::Reasoning {
                        content: reasoning.clone(),
                    });
                }
            }

            if let Some(content) = &choice.delta.content {
                if !content.is_empty() {
                    events.push(StreamEvent::Message {
                        content: content.clone(),
                    });
                }
            }

            if let Some(finish_reason) = &choice.finish_reason {
                events.push(StreamEvent::Done {
                    finish_reason: Some(finish_reason.clone()),
                });
            }
        }

        events
    }
}

/// Parse the SSE body of a streaming chat completion into [`StreamEvent`]s.
pub fn parse_chat_sse_stream(
    response: Response,
) -> Pin<Box<dyn Stream<Item = Result<StreamEvent>> + Send>> {
    chat_events_from_bytes(response.bytes_stream())
}

/// SSE line reassembly over an arbitrary byte stream.
///
/// `data:` payloads may be split across byte chunks; lines are cut on `\n`.
pub fn chat_events_from_bytes<S, E>(
    stream: S,
) -> Pin<Box<dyn Stream<Item = Result<StreamEvent>> + Send>>
where
    S: Stream<Item = std::result::Result<Bytes, E>> + Send + 'static,
    E: Display + Send,
{
    Box::pin(async_stream::stream! {
        let mut byte_chunks = Box::pin(stream);
        let mut buffer = VecDeque::with_capacity(8192);

        while let Some(chunk_result) = byte_chunks.next().await {
            match chunk_result {
                Ok(bytes) => {
                    buffer.extend(bytes);

                    while let Some(newline_pos) = buffer.iter().position(|&b| b == b'\n') {
                        let line_bytes: Vec<u8> = buffer.drain(..=newline_pos).collect();

                        if let Ok(line_str) = std::str::from_utf8(&line_bytes) {
                            let line = line_str.trim();

                            if line.is_empty() {
                                continue;
                            }

                            if let Some(data) = line.strip_prefix("data: ") {
                                if data == "[DONE]" {
                                    yield Ok(StreamEvent::Done { finish_reason: None });
                                    break;
                                }

                                match serde_json::from_str::<ChatStreamChunk>(data) {
                                    Ok(chunk) => {
                                        for event in chunk.to_stream_events() {
                                            yield Ok(event);
                                        }
                                    }
                                    Err(e) => yield Err(anyhow::anyhow!("Failed to parse chat chunk: {}", e)),
                                }
                            }
                        }
                    }
                }
                Err(e) => yield Err(anyhow::anyhow!("Stream error: {}", e)),
            }
        }
    })
}
