//! Explanation streaming: turn a computed result into narrated prose chunks

use std::sync::Arc;

use serde_json::json;
use tokio::sync::mpsc;
use tracing::warn;

use crate::llm::LanguageModel;
use crate::normalize::ResultEnvelope;

const EXPLAIN_SYSTEM: &str = "You are a data analyst explaining a computed result to a \
business user. The analysis is already done; do not recompute anything, do not invent \
numbers that are not in the result, and do not mention JSON or internal field names. \
Be concise and concrete.";

/// One line of the chat stream, serialized as NDJSON by the web layer
#[derive(Clone, Debug, serde::Serialize)]
#[serde(untagged)]
pub enum ChatChunk {
    Content { content: String },
    Error { error: String },
    Done { done: bool },
}

/// Keep the result context small enough that the prompt stays well inside
/// the model's window even for wide tables
const MAX_CONTEXT_CHARS: usize = 6000;

fn explain_prompt(prompt: &str, envelope: &ResultEnvelope) -> String {
    let mut payload = serde_json::to_string(&json!({
        "kind": envelope.kind,
        "result": envelope.payload,
    }))
    .unwrap_or_default();
    if payload.len() > MAX_CONTEXT_CHARS {
        let cut = (0..=MAX_CONTEXT_CHARS)
            .rev()
            .find(|&i| payload.is_char_boundary(i))
            .unwrap_or(0);
        payload.truncate(cut);
        payload.push_str(" …(truncated)");
    }
    format!(
        "The user asked: {}\n\nThe computed result ({}):\n{}\n\nExplain what this result \
shows, in plain language.",
        prompt, envelope.kind, payload
    )
}

/// Stream an explanation of an already-computed result. The channel always
/// ends with a `done` marker; model failure produces one error chunk before
/// it. With no model configured, a canned line is emitted instead.
pub async fn stream_explanation(
    llm: Option<Arc<dyn LanguageModel>>,
    prompt: &str,
    envelope: &ResultEnvelope,
) -> mpsc::Receiver<ChatChunk> {
    let (tx, rx) = mpsc::channel(32);

    let Some(llm) = llm else {
        let _ = tx
            .send(ChatChunk::Content {
                content: "The analysis finished; no explanation model is configured."
                    .to_string(),
            })
            .await;
        let _ = tx.send(ChatChunk::Done { done: true }).await;
        return rx;
    };

    let user = explain_prompt(prompt, envelope);
    tokio::spawn(async move {
        match llm.stream_complete(EXPLAIN_SYSTEM, &user).await {
            Ok(mut chunks) => {
                while let Some(chunk) = chunks.recv().await {
                    match chunk {
                        Ok(content) => {
                            if tx.send(ChatChunk::Content { content }).await.is_err() {
                                return;
                            }
                        }
                        Err(e) => {
                            warn!(error = %e, "explanation stream failed mid-flight");
                            let _ = tx
                                .send(ChatChunk::Error {
                                    error: "The data service is temporarily unavailable."
                                        .to_string(),
                                })
                                .await;
                            break;
                        }
                    }
                }
            }
            Err(e) => {
                warn!(error = %e, "explanation stream could not start");
                let _ = tx
                    .send(ChatChunk::Error {
                        error: "The data service is temporarily unavailable.".to_string(),
                    })
                    .await;
            }
        }
        let _ = tx.send(ChatChunk::Done { done: true }).await;
    });

    rx
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;
    use async_trait::async_trait;

    struct FakeModel {
        chunks: Vec<Result<String, String>>,
    }

    #[async_trait]
    impl LanguageModel for FakeModel {
        async fn complete(&self, _system: &str, _user: &str) -> Result<String> {
            Ok(String::new())
        }

        async fn stream_complete(
            &self,
            _system: &str,
            _user: &str,
        ) -> Result<mpsc::Receiver<Result<String>>> {
            let (tx, rx) = mpsc::channel(8);
            let chunks: Vec<Result<String>> = self
                .chunks
                .iter()
                .map(|c| match c {
                    Ok(s) => Ok(s.clone()),
                    Err(e) => Err(anyhow::anyhow!(e.clone())),
                })
                .collect();
            tokio::spawn(async move {
                for chunk in chunks {
                    if tx.send(chunk).await.is_err() {
                        return;
                    }
                }
            });
            Ok(rx)
        }
    }

    fn envelope() -> ResultEnvelope {
        ResultEnvelope {
            kind: "summary".to_string(),
            payload: json!({"row_count": 3}),
            diagnostics: json!({}),
        }
    }

    async fn collect(mut rx: mpsc::Receiver<ChatChunk>) -> Vec<ChatChunk> {
        let mut out = Vec::new();
        while let Some(chunk) = rx.recv().await {
            out.push(chunk);
        }
        out
    }

    #[tokio::test]
    async fn stream_ends_with_done_marker() {
        let model = Arc::new(FakeModel {
            chunks: vec![Ok("The dataset ".to_string()), Ok("has 3 rows.".to_string())],
        });
        let rx = stream_explanation(Some(model), "summarize", &envelope()).await;
        let chunks = collect(rx).await;
        assert_eq!(chunks.len(), 3);
        assert!(matches!(&chunks[0], ChatChunk::Content { content } if content == "The dataset "));
        assert!(matches!(&chunks[2], ChatChunk::Done { done: true }));
    }

    #[tokio::test]
    async fn mid_stream_failure_emits_error_then_done() {
        let model = Arc::new(FakeModel {
            chunks: vec![
                Ok("partial".to_string()),
                Err("connection reset".to_string()),
            ],
        });
        let rx = stream_explanation(Some(model), "summarize", &envelope()).await;
        let chunks = collect(rx).await;
        assert!(matches!(&chunks[0], ChatChunk::Content { .. }));
        assert!(matches!(&chunks[1], ChatChunk::Error { .. }));
        assert!(matches!(chunks.last(), Some(ChatChunk::Done { done: true })));
    }

    #[tokio::test]
    async fn missing_model_yields_canned_line() {
        let rx = stream_explanation(None, "summarize", &envelope()).await;
        let chunks = collect(rx).await;
        assert_eq!(chunks.len(), 2);
        assert!(matches!(&chunks[0], ChatChunk::Content { .. }));
    }
}
