//! Gemini-backed answerer.
//!
//! Calls the `generateContent` endpoint with a JSON response mime type and
//! parses the structured answer. Every failure mode (transport, HTTP status,
//! missing candidates, unparsable JSON) degrades to the deterministic
//! fallback; a search request never fails because the model did.

use async_trait::async_trait;
use serde_json::{json, Value};

use super::{build_prompt, fallback_payload, parse_answer_payload, Answerer, AnswerPayload, NO_CONTEXT_ANSWER};
use crate::rag::assembler::ContextSegment;

const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

pub struct GeminiAnswerer {
    client: reqwest::Client,
    api_key: String,
    model: String,
    base_url: String,
}

impl GeminiAnswerer {
    pub fn new(api_key: String, model: String) -> Self {
        Self::with_base_url(api_key, model, DEFAULT_BASE_URL.to_string())
    }

    /// Base URL override, used to point at a stub server in tests.
    pub fn with_base_url(api_key: String, model: String, base_url: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key,
            model,
            base_url,
        }
    }

    async fn call_model(&self, prompt: &str) -> Result<String, String> {
        let url = format!(
            "{}/models/{}:generateContent?key={}",
            self.base_url, self.model, self.api_key
        );

        let body = json!({
            "contents": [{ "parts": [{ "text": prompt }] }],
            "generationConfig": {
                "temperature": 0.25,
                "topP": 0.9,
                "topK": 64,
                "responseMimeType": "application/json",
            },
        });

        let res = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(|e| e.to_string())?;

        if !res.status().is_success() {
            let status = res.status();
            let text = res.text().await.unwrap_or_default();
            return Err(format!("HTTP {status}: {text}"));
        }

        let payload: Value = res.json().await.map_err(|e| e.to_string())?;
        payload["candidates"][0]["content"]["parts"][0]["text"]
            .as_str()
            .map(|s| s.to_string())
            .ok_or_else(|| "no text candidate in response".to_string())
    }
}

#[async_trait]
impl Answerer for GeminiAnswerer {
    fn model_id(&self) -> String {
        self.model.clone()
    }

    async fn generate(&self, question: &str, segments: &[ContextSegment]) -> AnswerPayload {
        if segments.is_empty() {
            return AnswerPayload {
                answer: NO_CONTEXT_ANSWER.to_string(),
                sections: Vec::new(),
            };
        }

        let prompt = build_prompt(question, segments);
        tracing::debug!("calling answer model, prompt length {}", prompt.len());

        let raw = match self.call_model(&prompt).await {
            Ok(raw) => raw,
            Err(err) => {
                tracing::error!("answer model call failed: {}", err);
                return fallback_payload(question, segments, Some(&err));
            }
        };

        match parse_answer_payload(&raw) {
            Some(payload) => payload,
            None => {
                tracing::error!(
                    "answer model returned unparsable output ({} chars)",
                    raw.len()
                );
                fallback_payload(question, segments, Some("unparsable model output"))
            }
        }
    }
}
