use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use chapter_domain::{SearchResult, cmp_score_desc};
use chapter_providers::analyzer::{AnalysisCandidate, AnalyzedCandidate};

use crate::{AnalysisCache, ChapterService, Error, Result, search::AnalysisLevel};

const ANALYSIS_CACHE_SCHEMA_VERSION: i32 = 1;

#[derive(Debug, Serialize, Deserialize)]
struct AnalysisCachePayload {
	items: Vec<AnalyzedCandidate>,
}

pub fn build_analysis_cache_key(
	query: &str,
	level: AnalysisLevel,
	provider_id: &str,
	model: &str,
	candidate_ids: &[Uuid],
) -> Result<String> {
	let payload = serde_json::json!({
		"kind": "analysis",
		"schema_version": ANALYSIS_CACHE_SCHEMA_VERSION,
		"query": query.trim(),
		"level": level.as_str(),
		"provider_id": provider_id,
		"model": model,
		"candidates": candidate_ids,
	});
	let raw = serde_json::to_vec(&payload).map_err(|err| Error::Storage {
		message: format!("Failed to encode cache key payload: {err}"),
	})?;

	Ok(blake3::hash(&raw).to_hex().to_string())
}

pub fn cache_key_prefix(key: &str) -> &str {
	let len = key.len().min(12);

	&key[..len]
}

/// Overwrites analyzed results within the first `top_k` and re-sorts the whole list.
///
/// Results past `top_k` were never sent for analysis and keep their retrieval values, even when
/// the analyzer names them.
fn apply_analyzed(
	results: &mut [SearchResult],
	top_k: usize,
	analyzed: Vec<AnalyzedCandidate>,
) -> usize {
	let top_k = top_k.min(results.len());
	let mut by_id: HashMap<Uuid, AnalyzedCandidate> =
		analyzed.into_iter().map(|item| (item.id, item)).collect();
	let mut applied = 0;

	for result in results[..top_k].iter_mut() {
		if let Some(item) = by_id.remove(&result.id) {
			result.apply_analysis(item.enhanced_score, item.relevance_reason, item.key_topics);

			applied += 1;
		}
	}

	results.sort_by(|a, b| cmp_score_desc(a.relevance_score, b.relevance_score));

	applied
}

impl ChapterService {
	/// Best-effort relevance analysis over the top-K merged results.
	///
	/// Any failure leaves `results` exactly as it was.
	pub(super) async fn analyze_top(&self, query: &str, results: &mut [SearchResult]) {
		let top_k = (self.cfg.search.analysis_top_k as usize).min(results.len());

		if top_k == 0 {
			return;
		}

		let cfg = &self.cfg.providers.analyzer;
		let level =
			AnalysisLevel::parse(&self.cfg.search.analysis_level).unwrap_or(AnalysisLevel::Standard);
		let candidate_ids: Vec<Uuid> = results[..top_k].iter().map(|result| result.id).collect();
		let cache = self.collaborators.cache.as_deref();
		let cache_key = match cache {
			Some(_) => match build_analysis_cache_key(
				query,
				level,
				&cfg.provider_id,
				&cfg.model,
				&candidate_ids,
			) {
				Ok(key) => Some(key),
				Err(err) => {
					tracing::warn!(error = %err, "Cache key build failed.");

					None
				},
			},
			None => None,
		};
		let cached = match (cache, cache_key.as_deref()) {
			(Some(cache), Some(key)) => self.read_cached(cache, key).await,
			_ => None,
		};
		let analyzed = match cached {
			Some(items) => items,
			None => {
				let candidates: Vec<AnalysisCandidate<'_>> = results[..top_k]
					.iter()
					.map(|result| AnalysisCandidate {
						id: result.id,
						book_title: &result.book_title,
						chapter_title: &result.chapter_title,
						snippet: &result.snippet,
						score: result.relevance_score,
					})
					.collect();
				let fetched = self
					.guard(
						"analysis",
						self.collaborators.analyzer.analyze(cfg, query, &candidates, level),
					)
					.await;
				let items = match fetched {
					Ok(items) if !items.is_empty() => items,
					Ok(_) => {
						tracing::warn!(
							"Relevance analysis returned no candidates. Keeping retrieval scores."
						);

						return;
					},
					Err(err) => {
						tracing::warn!(
							error = %err,
							"Relevance analysis failed. Keeping retrieval scores."
						);

						return;
					},
				};

				if let (Some(cache), Some(key)) = (cache, cache_key.as_deref()) {
					self.write_cached(cache, key, &items).await;
				}

				items
			},
		};

		let applied = apply_analyzed(results, top_k, analyzed);

		tracing::info!(
			level = level.as_str(),
			candidates = top_k,
			applied,
			"Relevance analysis applied."
		);
	}

	async fn read_cached(
		&self,
		cache: &dyn AnalysisCache,
		key: &str,
	) -> Option<Vec<AnalyzedCandidate>> {
		let payload = match self.guard("analysis_cache", cache.get(key)).await {
			Ok(Some(payload)) => payload,
			Ok(None) => {
				tracing::info!(cache_key_prefix = cache_key_prefix(key), hit = false, "Cache miss.");

				return None;
			},
			Err(err) => {
				tracing::warn!(
					error = %err,
					cache_key_prefix = cache_key_prefix(key),
					"Cache read failed."
				);

				return None;
			},
		};

		match serde_json::from_value::<AnalysisCachePayload>(payload) {
			Ok(decoded) if !decoded.items.is_empty() => {
				tracing::info!(cache_key_prefix = cache_key_prefix(key), hit = true, "Cache hit.");

				Some(decoded.items)
			},
			Ok(_) => None,
			Err(err) => {
				tracing::warn!(
					error = %err,
					cache_key_prefix = cache_key_prefix(key),
					"Cache payload decode failed."
				);

				None
			},
		}
	}

	async fn write_cached(
		&self,
		cache: &dyn AnalysisCache,
		key: &str,
		items: &[AnalyzedCandidate],
	) {
		let payload = AnalysisCachePayload { items: items.to_vec() };
		let payload: Value = match serde_json::to_value(payload) {
			Ok(payload) => payload,
			Err(err) => {
				tracing::warn!(error = %err, "Cache payload encode failed.");

				return;
			},
		};

		if let Err(err) = self.guard("analysis_cache", cache.put(key, &payload)).await {
			tracing::warn!(
				error = %err,
				cache_key_prefix = cache_key_prefix(key),
				"Cache write failed."
			);
		}
	}
}
