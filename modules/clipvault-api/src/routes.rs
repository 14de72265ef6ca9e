use std::sync::Arc;

use axum::{extract::State, response::Json};
use serde::{Deserialize, Serialize};
use tracing::info;

use ai_client::{ChatAgent, Claude, EmbedAgent, OpenAi};
use clipvault_common::{ClipVaultError, ProfileStore, VideoRecord};
use clipvault_rag::{IndexPaths, Retriever};
use feed_client::normalize_profile;

use crate::error::ApiError;
use crate::AppState;

const SYSTEM_PROMPT: &str = "You are the creator's knowledge base, answering from their \
short-form video transcripts.\n\nRULES:\n1. Answer ONLY from the provided context.\n2. When \
something is not in the context, say so plainly.\n3. Cite relevant video ids as sources.\n4. \
Structure answers with clear bullet points.\n5. Close with a one-line takeaway.";

#[derive(Debug, Deserialize)]
pub struct AnswerRequest {
    pub question: String,
    #[serde(default = "default_mode")]
    pub mode: String,
    #[serde(default = "default_model")]
    pub model: String,
    /// 0 = all indexed items.
    #[serde(default = "default_top_k")]
    pub top_k: usize,
    #[serde(default)]
    pub include_captions: bool,
    pub profile: String,
}

fn default_mode() -> String {
    "full".to_string()
}

fn default_model() -> String {
    "gpt-4.1".to_string()
}

fn default_top_k() -> usize {
    30
}

#[derive(Debug, Serialize)]
pub struct SourceRef {
    pub id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    pub score: f32,
}

#[derive(Debug, Serialize)]
pub struct AnswerResponse {
    pub mode: String,
    pub answer: String,
    pub model: String,
    pub provider: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sources: Option<Vec<SourceRef>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub top_k: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_videos: Option<usize>,
}

pub async fn answer(
    State(state): State<Arc<AppState>>,
    Json(req): Json<AnswerRequest>,
) -> Result<Json<AnswerResponse>, ApiError> {
    let profile = normalize_profile(&req.profile);
    let store = ProfileStore::new(&state.config.data_dir, &profile.username);
    let unified = store.load_unified()?;

    info!(
        profile = %profile.username,
        mode = %req.mode,
        model = %req.model,
        "Answer request"
    );

    let agent = chat_agent(&state, &req.model)?;

    if req.mode == "full" {
        let context = full_context(&store)?;
        let user = format!(
            "QUESTION: {}\n\nCONTEXT (all transcripts):\n{context}",
            req.question
        );
        let answer = agent.answer(SYSTEM_PROMPT, &user).await?;

        return Ok(Json(AnswerResponse {
            mode: "full".to_string(),
            answer,
            model: req.model,
            provider: agent.provider().to_string(),
            sources: None,
            top_k: None,
            total_videos: Some(unified.records.len()),
        }));
    }

    // RAG mode: embed the question with the model the index was built with.
    let retriever = Retriever::load(&IndexPaths::new(&store))?;
    let embedder = OpenAi::new(&state.config.openai_api_key, "gpt-4.1")
        .with_embedding_model(retriever.model());
    let query = embedder
        .embed(&req.question)
        .await
        .map_err(|e| ClipVaultError::Embedding(e.to_string()))?;

    let hits = retriever.search(&query, req.top_k)?;

    let mut context_parts: Vec<String> = Vec::with_capacity(hits.len());
    let mut sources: Vec<SourceRef> = Vec::with_capacity(hits.len());
    for hit in &hits {
        let Some(record) = unified.records.iter().find(|r| r.id == hit.id) else {
            continue;
        };
        context_parts.push(record_context(record, req.include_captions));
        sources.push(SourceRef {
            id: hit.id.clone(),
            url: record.url.clone(),
            score: hit.score,
        });
    }

    let top_k = hits.len();
    let user = format!(
        "QUESTION: {}\n\nCONTEXT (top {top_k} relevant videos):\n{}",
        req.question,
        context_parts.join("\n\n")
    );
    let answer = agent.answer(SYSTEM_PROMPT, &user).await?;

    Ok(Json(AnswerResponse {
        mode: "rag".to_string(),
        answer,
        model: req.model,
        provider: agent.provider().to_string(),
        sources: Some(sources),
        top_k: Some(top_k),
        total_videos: None,
    }))
}

pub async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

pub async fn models() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "available": [
            {"id": "gpt-4.1", "name": "GPT-4.1", "provider": "openai"},
            {"id": "claude-sonnet-4-20250514", "name": "Claude Sonnet 4", "provider": "anthropic"},
        ]
    }))
}

/// Route a model name to its provider.
fn chat_agent(state: &AppState, model: &str) -> Result<Box<dyn ChatAgent>, ApiError> {
    let lowered = model.to_lowercase();
    if lowered.contains("claude") || lowered.contains("opus") || lowered.contains("sonnet") {
        let key = state.config.anthropic_api_key.as_deref().ok_or_else(|| {
            ClipVaultError::Config("ANTHROPIC_API_KEY required for Claude models".to_string())
        })?;
        Ok(Box::new(Claude::new(key, model)))
    } else {
        Ok(Box::new(OpenAi::new(&state.config.openai_api_key, model)))
    }
}

/// The concatenated transcript corpus produced by the export step; empty when
/// the export has not run.
fn full_context(store: &ProfileStore) -> Result<String, ClipVaultError> {
    let path = store.rag_dir().join("all_transcripts.md");
    if !path.exists() {
        return Ok(String::new());
    }
    std::fs::read_to_string(&path)
        .map_err(|e| ClipVaultError::Store(format!("{}: {e}", path.display())))
}

fn record_context(record: &VideoRecord, include_captions: bool) -> String {
    let transcript = record.transcript_text().unwrap_or("");
    let mut part = format!("# Video {}\n{transcript}", record.id);
    if include_captions {
        let captions = record.caption_text();
        if !captions.is_empty() {
            part.push('\n');
            part.push_str(&captions);
        }
    }
    part.trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn answer_request_defaults() {
        let req: AnswerRequest =
            serde_json::from_str(r#"{"question": "what about hooks?", "profile": "creator"}"#)
                .unwrap();
        assert_eq!(req.mode, "full");
        assert_eq!(req.model, "gpt-4.1");
        assert_eq!(req.top_k, 30);
        assert!(!req.include_captions);
    }

    #[test]
    fn record_context_appends_captions_on_request() {
        let mut rec = VideoRecord::new("7301");
        rec.transcript = Some(clipvault_common::Transcript {
            text: "spoken".to_string(),
            model: "m".to_string(),
            provider: "openai".to_string(),
            created_at: chrono::Utc::now(),
        });
        rec.captions = vec![clipvault_common::Caption {
            path: None,
            ext: None,
            lang: Some("eng-US".to_string()),
            text: Some("captioned".to_string()),
        }];

        let without = record_context(&rec, false);
        assert!(without.contains("spoken"));
        assert!(!without.contains("captioned"));

        let with = record_context(&rec, true);
        assert!(with.contains("captioned"));
    }
}
