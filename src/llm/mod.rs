//! Answer generation over retrieved context.
//!
//! The `Answerer` trait wraps the LLM call. Implementations never fail:
//! provider outages and unparsable output degrade to a deterministic
//! fallback built from the retrieved segments themselves.

mod gemini;

pub use gemini::GeminiAnswerer;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::rag::assembler::ContextSegment;

/// Fixed answer returned when retrieval produced no context at all.
pub const NO_CONTEXT_ANSWER: &str =
    "No relevant context was retrieved, so I cannot answer the question.";

/// One section of a structured answer, as produced by the model.
///
/// `chunk_ids` stays as raw JSON values here; lossy integer coercion happens
/// during reconciliation, where malformed ids are dropped silently.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnswerSection {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub chunk_ids: Vec<Value>,
}

/// Structured answerer output.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnswerPayload {
    #[serde(default)]
    pub answer: String,
    #[serde(default)]
    pub sections: Vec<AnswerSection>,
}

#[async_trait]
pub trait Answerer: Send + Sync {
    /// Identifier of the generating model, for response bookkeeping.
    fn model_id(&self) -> String;

    /// Generate a structured answer for the question over the ordered
    /// segments. Must not fail; implementations degrade internally.
    async fn generate(&self, question: &str, segments: &[ContextSegment]) -> AnswerPayload;
}

/// Parse raw model output into an `AnswerPayload`.
///
/// Strips markdown code fences if present. Missing `answer`/`sections` keys
/// default to empty values; anything that is not a JSON object is `None`.
pub fn parse_answer_payload(raw: &str) -> Option<AnswerPayload> {
    let trimmed = strip_code_fences(raw);
    let value: Value = serde_json::from_str(trimmed).ok()?;
    if !value.is_object() {
        return None;
    }
    serde_json::from_value(value).ok()
}

fn strip_code_fences(raw: &str) -> &str {
    let raw = raw.trim();
    for fence in ["```json", "```"] {
        if let Some(start) = raw.find(fence) {
            let body_start = start + fence.len();
            if let Some(end) = raw[body_start..].find("```") {
                return raw[body_start..body_start + end].trim();
            }
        }
    }
    raw
}

/// Deterministic answer used when the model is disabled or failing: the
/// question-framed concatenation of all segment contents, one section per
/// segment referencing exactly that segment's chunk.
pub fn fallback_payload(
    question: &str,
    segments: &[ContextSegment],
    error: Option<&str>,
) -> AnswerPayload {
    let joined_context = segments
        .iter()
        .filter(|seg| !seg.content.is_empty())
        .map(|seg| seg.content.as_str())
        .collect::<Vec<_>>()
        .join("\n\n");

    let mut answer = format!(
        "The answer model was unavailable so this response is based on the retrieved context directly.\n\n\
         Question: {question}\n\nContext:\n{joined_context}"
    );
    if let Some(error) = error {
        answer.push_str(&format!("\n\n[LLM Error: {error}]"));
    }

    AnswerPayload {
        answer,
        sections: segments
            .iter()
            .enumerate()
            .map(|(idx, seg)| AnswerSection {
                title: Some(format!("Context Segment {}", idx + 1)),
                text: Some(seg.content.clone()),
                chunk_ids: vec![serde_json::json!(seg.chunk_id)],
            })
            .collect(),
    }
}

/// Answerer used when no model API key is configured. Returns the
/// deterministic fallback for every question.
pub struct DeterministicAnswerer;

#[async_trait]
impl Answerer for DeterministicAnswerer {
    fn model_id(&self) -> String {
        "retriever_only".to_string()
    }

    async fn generate(&self, question: &str, segments: &[ContextSegment]) -> AnswerPayload {
        if segments.is_empty() {
            return AnswerPayload {
                answer: NO_CONTEXT_ANSWER.to_string(),
                sections: Vec::new(),
            };
        }
        fallback_payload(question, segments, None)
    }
}

/// Build the chunk-tagged prompt shared by model-backed answerers.
pub(crate) fn build_prompt(question: &str, segments: &[ContextSegment]) -> String {
    let context_text = segments
        .iter()
        .filter(|seg| !seg.content.trim().is_empty())
        .map(|seg| {
            format!(
                "[Chunk ID: {}, Page: {}]\n{}",
                seg.chunk_id,
                seg.page_number,
                seg.content.trim()
            )
        })
        .collect::<Vec<_>>()
        .join("\n\n---\n\n");

    format!(
        "You are an enterprise RAG assistant. Use only the provided context segments to answer the question.\n\n\
         Context segments:\n{context_text}\n\n\
         Question: {question}\n\n\
         Instructions:\n\
         - Use only the information from the context segments above\n\
         - Return a JSON object with this exact structure:\n\
         {{\n  \"answer\": \"<overall response based on the context>\",\n  \"sections\": [\n    {{\n      \"title\": \"<short heading for this section>\",\n      \"chunk_ids\": [<chunk_id_numbers_as_integers>],\n      \"text\": \"<detailed explanation using the referenced chunks>\"\n    }}\n  ]\n}}\n\
         - Only reference chunk_ids that appear in the context segments\n\
         - If information is missing, state that explicitly\n\
         - Ensure the JSON is valid and properly formatted"
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rag::assembler::DocumentSummary;

    fn segment(chunk_id: i64, content: &str) -> ContextSegment {
        ContextSegment {
            order: 1,
            chunk_id,
            document_id: 1,
            page_number: 1,
            chunk_index: 1,
            content: content.to_string(),
            metadata: serde_json::json!({}),
            images: Vec::new(),
            similarity: 0.9,
            document: DocumentSummary {
                id: Some(1),
                filename: Some("doc.pdf".to_string()),
                url: Some("/api/documents/1/file".to_string()),
            },
        }
    }

    #[test]
    fn parses_plain_json() {
        let payload = parse_answer_payload(
            r#"{"answer": "hi", "sections": [{"title": "t", "chunk_ids": [1, "2"], "text": "x"}]}"#,
        )
        .unwrap();
        assert_eq!(payload.answer, "hi");
        assert_eq!(payload.sections.len(), 1);
        assert_eq!(payload.sections[0].chunk_ids.len(), 2);
    }

    #[test]
    fn parses_fenced_json() {
        let raw = "Here you go:\n```json\n{\"answer\": \"fenced\", \"sections\": []}\n```";
        let payload = parse_answer_payload(raw).unwrap();
        assert_eq!(payload.answer, "fenced");
    }

    #[test]
    fn missing_keys_default_to_empty() {
        let payload = parse_answer_payload("{}").unwrap();
        assert_eq!(payload.answer, "");
        assert!(payload.sections.is_empty());
    }

    #[test]
    fn non_object_output_is_rejected() {
        assert!(parse_answer_payload("[1, 2, 3]").is_none());
        assert!(parse_answer_payload("plain prose, no json").is_none());
    }

    #[tokio::test]
    async fn empty_segments_yield_no_context_answer() {
        let payload = DeterministicAnswerer.generate("why?", &[]).await;
        assert_eq!(payload.answer, NO_CONTEXT_ANSWER);
        assert!(payload.sections.is_empty());
    }

    #[tokio::test]
    async fn fallback_emits_one_section_per_segment() {
        let segments = vec![segment(11, "first passage"), segment(12, "second passage")];
        let payload = DeterministicAnswerer.generate("why?", &segments).await;

        assert!(payload.answer.contains("Question: why?"));
        assert!(payload.answer.contains("first passage"));
        assert_eq!(payload.sections.len(), 2);
        assert_eq!(payload.sections[0].chunk_ids, vec![serde_json::json!(11)]);
        assert_eq!(
            payload.sections[1].title.as_deref(),
            Some("Context Segment 2")
        );
    }

    #[test]
    fn prompt_tags_chunks_and_skips_empty_content() {
        let segments = vec![segment(3, "useful text"), segment(4, "   ")];
        let prompt = build_prompt("q", &segments);
        assert!(prompt.contains("[Chunk ID: 3, Page: 1]"));
        assert!(!prompt.contains("[Chunk ID: 4"));
    }
}
