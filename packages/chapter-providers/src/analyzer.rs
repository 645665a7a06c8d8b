//! Chat-completion backed relevance analysis.
//!
//! The model receives the query and a batch of candidates and must answer with a JSON object of
//! the form `{"results": [{"id", "enhanced_score", "relevance_reason", "key_topics"}]}`.

use std::time::Duration;

use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::{Error, Result};

const MAX_ATTEMPTS: usize = 3;

#[derive(Debug, Clone, Serialize)]
pub struct AnalysisCandidate<'a> {
	pub id: Uuid,
	pub book_title: &'a str,
	pub chapter_title: &'a str,
	pub snippet: &'a str,
	pub score: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalyzedCandidate {
	pub id: Uuid,
	pub enhanced_score: f32,
	pub relevance_reason: String,
	#[serde(default)]
	pub key_topics: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct AnalysisPayload {
	results: Vec<AnalyzedCandidate>,
}

pub async fn analyze(
	cfg: &chapter_config::LlmProviderConfig,
	query: &str,
	candidates: &[AnalysisCandidate<'_>],
	level: &str,
) -> Result<Vec<AnalyzedCandidate>> {
	let client = Client::builder().timeout(Duration::from_millis(cfg.timeout_ms)).build()?;
	let url = crate::endpoint(&cfg.api_base, &cfg.path);
	let messages = build_messages(query, candidates, level)?;
	let body = serde_json::json!({
		"model": cfg.model,
		"temperature": cfg.temperature,
		"response_format": { "type": "json_object" },
		"messages": messages,
	});

	for _ in 0..MAX_ATTEMPTS {
		let res = client
			.post(&url)
			.headers(crate::auth_headers(&cfg.api_key, &cfg.default_headers)?)
			.json(&body)
			.send()
			.await?;
		let json: Value = res.error_for_status()?.json().await?;

		if let Ok(parsed) = parse_analysis_response(json) {
			return Ok(parsed);
		}
	}

	Err(Error::invalid_response("Analyzer response is not valid JSON."))
}

pub fn build_messages(
	query: &str,
	candidates: &[AnalysisCandidate<'_>],
	level: &str,
) -> Result<Vec<Value>> {
	let depth = match level {
		"basic" => "Give a one-sentence reason and up to 3 key topics per chapter.",
		"deep" =>
			"Give a detailed reason (up to four sentences) that cites the chapter's argument, and \
			 3 to 5 key topics per chapter.",
		_ => "Give a two-sentence reason and 3 to 5 key topics per chapter.",
	};
	let system = format!(
		"You rank book chapters for a reader's query. Score each chapter's relevance from 0.0 to \
		 1.0. {depth} Respond with a JSON object {{\"results\": [{{\"id\": string, \
		 \"enhanced_score\": number, \"relevance_reason\": string, \"key_topics\": [string]}}]}} \
		 and include every chapter id you were given exactly once."
	);
	let user = serde_json::to_string(&serde_json::json!({
		"query": query,
		"chapters": candidates,
	}))?;

	Ok(vec![
		serde_json::json!({ "role": "system", "content": system }),
		serde_json::json!({ "role": "user", "content": user }),
	])
}

fn parse_analysis_response(json: Value) -> Result<Vec<AnalyzedCandidate>> {
	let content = json
		.get("choices")
		.and_then(|v| v.as_array())
		.and_then(|arr| arr.first())
		.and_then(|choice| choice.get("message"))
		.and_then(|msg| msg.get("content"))
		.and_then(|c| c.as_str())
		.map(str::to_owned);
	let payload = match content {
		Some(content) => serde_json::from_str::<AnalysisPayload>(&content)
			.map_err(|_| Error::invalid_response("Analyzer content is not valid JSON."))?,
		None if json.get("results").is_some() => serde_json::from_value::<AnalysisPayload>(json)?,
		None => return Err(Error::invalid_response("Analyzer response is missing JSON content.")),
	};

	Ok(payload
		.results
		.into_iter()
		.filter(|item| item.enhanced_score.is_finite())
		.map(|mut item| {
			item.enhanced_score = item.enhanced_score.clamp(0.0, 1.0);

			item
		})
		.collect())
}
