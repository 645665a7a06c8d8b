//! Tiered chapter search.
//!
//! Stages run in priority order and results are merged after every stage. Each collaborator call
//! is bounded by `search.stage_timeout_ms` and degrades to the next fallback when it fails. Only a
//! blank query and a complete retrieval outage surface as errors.

mod adapters;
mod analysis;

pub use analysis::{build_analysis_cache_key, cache_key_prefix};

use std::{future::Future, time::Duration};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use chapter_domain::{
	Allowance, Capability, SearchResult, SearchTier, SearchType, count_books, merge_results,
	resolve_tier,
};
use chapter_storage::queries::{NearestArgs, SubstringField, VectorColumn};

use crate::{ChapterService, Error, Result};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchRequest {
	pub query: String,
	/// Plan identifier; unknown plans resolve to the free tier.
	pub plan: String,
	/// Queries already spent in the current period.
	pub queries_used: u32,
}

#[derive(Debug, Clone, Serialize)]
pub struct TieredSearchResponse {
	pub results: Vec<SearchResult>,
	pub tier: SearchTier,
	pub queries_used: u32,
	pub queries_remaining: Allowance,
	/// True only when the allowance was already exhausted before this call.
	pub upgrade_required: bool,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub upgrade_message: Option<String>,
	/// Distinct books in the merged set, counted before truncation.
	pub total_books_found: usize,
	/// Merged result count before truncation.
	pub total_chapters_found: usize,
}
impl TieredSearchResponse {
	fn upgrade_required(tier: &SearchTier, queries_used: u32) -> Self {
		Self {
			results: Vec::new(),
			tier: *tier,
			queries_used,
			queries_remaining: Allowance::Limited(0),
			upgrade_required: true,
			upgrade_message: Some(tier.upgrade_message.to_string()),
			total_books_found: 0,
			total_chapters_found: 0,
		}
	}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnalysisLevel {
	Basic,
	Standard,
	Deep,
}
impl AnalysisLevel {
	pub fn as_str(self) -> &'static str {
		match self {
			Self::Basic => "basic",
			Self::Standard => "standard",
			Self::Deep => "deep",
		}
	}

	pub fn parse(raw: &str) -> Option<Self> {
		match raw.trim().to_ascii_lowercase().as_str() {
			"basic" => Some(Self::Basic),
			"standard" => Some(Self::Standard),
			"deep" => Some(Self::Deep),
			_ => None,
		}
	}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
	Summary,
	Chapter,
	Fulltext,
	Substring,
}
impl Stage {
	pub fn as_str(self) -> &'static str {
		match self {
			Self::Summary => "summary",
			Self::Chapter => "chapter",
			Self::Fulltext => "fulltext",
			Self::Substring => "substring",
		}
	}
}

/// Which stages a request runs, derived from tier capabilities and embedding availability.
///
/// The substring fallback is not part of the plan; it depends on what the planned stages return,
/// see [`needs_substring_fallback`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StagePlan {
	pub summary: bool,
	pub chapter: bool,
	pub fulltext: bool,
	pub analysis: bool,
}
impl StagePlan {
	pub fn resolve(tier: &SearchTier, has_embedding: bool) -> Self {
		// Full-text doubles as the fallback for a missing embedding on every tier.
		let mut plan =
			Self { summary: false, chapter: false, fulltext: !has_embedding, analysis: false };

		for capability in tier.capabilities {
			match capability {
				Capability::SummarySearch => plan.summary = has_embedding,
				Capability::ChapterSearch => plan.chapter = has_embedding,
				Capability::FulltextSearch => plan.fulltext = true,
				Capability::AiAnalysis => plan.analysis = true,
			}
		}

		plan
	}
}

/// What one retrieval stage produced.
#[derive(Debug, Clone, PartialEq)]
pub enum StageOutcome {
	Hits(Vec<SearchResult>),
	/// The store answered with no rows.
	Empty,
	/// The store errored or timed out.
	Failed,
	Skipped,
}
impl StageOutcome {
	fn settle(stage: Stage, fetched: Result<Vec<SearchResult>>) -> Self {
		match fetched {
			Ok(results) if results.is_empty() => Self::Empty,
			Ok(results) => Self::Hits(results),
			Err(err) => {
				tracing::warn!(
					stage = stage.as_str(),
					error = %err,
					"Retrieval stage failed. Continuing with the next fallback."
				);

				Self::Failed
			},
		}
	}

	/// True when a backing store answered, even with zero rows.
	pub fn reached_store(&self) -> bool {
		matches!(self, Self::Hits(_) | Self::Empty)
	}

	pub fn into_results(self) -> Vec<SearchResult> {
		match self {
			Self::Hits(results) => results,
			Self::Empty | Self::Failed | Self::Skipped => Vec::new(),
		}
	}
}

/// Candidate restriction for the chapter stage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChapterScope {
	/// Summary search did not run, so there is nothing to scope to.
	Unscoped,
	Within(Vec<Uuid>),
	/// Summary search ran and produced no candidates.
	Skip,
}

pub fn chapter_scope(summary: &StageOutcome) -> ChapterScope {
	match summary {
		StageOutcome::Skipped => ChapterScope::Unscoped,
		StageOutcome::Hits(results) =>
			ChapterScope::Within(results.iter().map(|result| result.id).collect()),
		StageOutcome::Empty | StageOutcome::Failed => ChapterScope::Skip,
	}
}

pub fn needs_substring_fallback(merged: &[SearchResult]) -> bool {
	merged.is_empty()
}

/// A request that found nothing must be distinguishable from one that reached no store.
pub fn is_total_outage(merged: &[SearchResult], reached_store: bool) -> bool {
	merged.is_empty() && !reached_store
}

impl ChapterService {
	pub async fn perform_search(&self, req: SearchRequest) -> Result<TieredSearchResponse> {
		let query = req.query.trim();

		if query.is_empty() {
			return Err(Error::InvalidRequest { message: "Query must not be empty.".to_string() });
		}

		let tier = resolve_tier(&req.plan);

		if tier.max_queries.is_exhausted(req.queries_used) {
			tracing::info!(
				tier = tier.name,
				queries_used = req.queries_used,
				"Query allowance exhausted. Skipping retrieval."
			);

			return Ok(TieredSearchResponse::upgrade_required(tier, req.queries_used));
		}

		let embedding = self.embed_query(query).await;
		let plan = StagePlan::resolve(tier, embedding.is_some());
		let mut results = Vec::new();
		let mut reached_store = false;
		let summary = match embedding.as_deref() {
			Some(vector) if plan.summary => self.summary_stage(query, vector).await,
			_ => StageOutcome::Skipped,
		};
		let scope = chapter_scope(&summary);

		reached_store |= summary.reached_store();
		results = merge_results(results, summary.into_results());

		let chapter = match (embedding.as_deref(), &scope) {
			(Some(vector), ChapterScope::Unscoped) if plan.chapter =>
				self.chapter_stage(query, vector, None).await,
			(Some(vector), ChapterScope::Within(ids)) if plan.chapter =>
				self.chapter_stage(query, vector, Some(ids.as_slice())).await,
			_ => StageOutcome::Skipped,
		};

		reached_store |= chapter.reached_store();
		results = merge_results(results, chapter.into_results());

		let fulltext =
			if plan.fulltext { self.fulltext_stage(query).await } else { StageOutcome::Skipped };

		reached_store |= fulltext.reached_store();
		results = merge_results(results, fulltext.into_results());

		if needs_substring_fallback(&results) {
			let substring = self.substring_stage(query).await;

			reached_store |= substring.reached_store();
			results = merge_results(results, substring.into_results());
		}
		if is_total_outage(&results, reached_store) {
			return Err(Error::RetrievalUnavailable {
				message: "No retrieval backend could be reached.".to_string(),
			});
		}

		let total_books_found = count_books(&results);
		let total_chapters_found = results.len();

		if plan.analysis {
			self.analyze_top(query, &mut results).await;
		}

		results.truncate(tier.max_results);

		let queries_used = req.queries_used.saturating_add(1);

		tracing::info!(
			tier = tier.name,
			total_chapters_found,
			returned = results.len(),
			"Search completed."
		);

		Ok(TieredSearchResponse {
			results,
			tier: *tier,
			queries_used,
			queries_remaining: tier.max_queries.remaining_after(queries_used),
			upgrade_required: false,
			upgrade_message: None,
			total_books_found,
			total_chapters_found,
		})
	}

	/// Embeds the query, or returns `None` so the vector stages are skipped.
	async fn embed_query(&self, query: &str) -> Option<Vec<f32>> {
		let texts = [query.to_string()];
		let cfg = &self.cfg.providers.embedding;
		let embedded = self.guard("embedding", self.collaborators.embedding.embed(cfg, &texts)).await;
		let vector = match embedded {
			Ok(vectors) => vectors.into_iter().next(),
			Err(err) => {
				tracing::warn!(
					error = %err,
					"Query embedding failed. Continuing without vector stages."
				);

				return None;
			},
		};
		let Some(vector) = vector else {
			tracing::warn!(
				"Embedding provider returned no vector. Continuing without vector stages."
			);

			return None;
		};

		if vector.len() != self.cfg.storage.vector_dim as usize {
			tracing::warn!(
				expected = self.cfg.storage.vector_dim,
				actual = vector.len(),
				"Query embedding has the wrong dimension. Continuing without vector stages."
			);

			return None;
		}

		Some(vector)
	}

	async fn summary_stage(&self, query: &str, vector: &[f32]) -> StageOutcome {
		let search = &self.cfg.search;
		let args = NearestArgs {
			column: VectorColumn::Summary,
			vector,
			max_distance: 1.0 - search.summary_min_similarity,
			limit: search.summary_limit,
			scope: None,
		};
		let fetched =
			self.guard(Stage::Summary.as_str(), self.collaborators.vectors.nearest(args)).await;

		StageOutcome::settle(
			Stage::Summary,
			fetched.map(|matches| {
				matches
					.into_iter()
					.map(|found| {
						adapters::vector_result(found, SearchType::Summary, query, self.snippet_chars())
					})
					.collect()
			}),
		)
	}

	/// Chapter-body search over the summary candidates.
	///
	/// A hit outside `scope` violates the store's scoping contract. It is logged and kept rather
	/// than dropped, so it can still enter the merged set as a new chapter.
	async fn chapter_stage(
		&self,
		query: &str,
		vector: &[f32],
		scope: Option<&[Uuid]>,
	) -> StageOutcome {
		let search = &self.cfg.search;
		let args = NearestArgs {
			column: VectorColumn::Content,
			vector,
			max_distance: 1.0 - search.chapter_min_similarity,
			limit: search.chapter_limit,
			scope,
		};
		let fetched =
			self.guard(Stage::Chapter.as_str(), self.collaborators.vectors.nearest(args)).await;

		StageOutcome::settle(
			Stage::Chapter,
			fetched.map(|matches| {
				matches
					.into_iter()
					.inspect(|found| {
						let chapter_id = found.chapter.chapter_id;

						if !scope.is_none_or(|ids| ids.contains(&chapter_id)) {
							tracing::warn!(
								chapter_id = %chapter_id,
								"Vector store returned a chapter outside the requested scope."
							);
						}
					})
					.map(|found| {
						adapters::vector_result(found, SearchType::Chapter, query, self.snippet_chars())
					})
					.collect()
			}),
		)
	}

	async fn fulltext_stage(&self, query: &str) -> StageOutcome {
		let limit = self.cfg.search.fulltext_limit;
		let fetched = self
			.guard(Stage::Fulltext.as_str(), self.collaborators.fulltext.fulltext(query, limit))
			.await;

		StageOutcome::settle(
			Stage::Fulltext,
			fetched.map(|matches| {
				matches
					.into_iter()
					.map(|found| adapters::ranked_result(found, query, self.snippet_chars()))
					.collect()
			}),
		)
	}

	/// Last resort: title, body and book-title variants run concurrently.
	async fn substring_stage(&self, query: &str) -> StageOutcome {
		let [title, body, book] = SubstringField::ALL;
		let (by_title, by_body, by_book) = tokio::join!(
			self.substring_variant(title, query),
			self.substring_variant(body, query),
			self.substring_variant(book, query),
		);
		let mut reached = false;
		let mut results = Vec::new();

		for (field, fetched) in [(title, by_title), (body, by_body), (book, by_book)] {
			match fetched {
				Ok(found) => {
					reached = true;
					results = merge_results(results, found);
				},
				Err(err) => {
					tracing::warn!(
						stage = Stage::Substring.as_str(),
						field = field.as_str(),
						error = %err,
						"Substring variant failed."
					);
				},
			}
		}

		if !reached {
			return StageOutcome::Failed;
		}

		StageOutcome::settle(Stage::Substring, Ok(results))
	}

	async fn substring_variant(
		&self,
		field: SubstringField,
		query: &str,
	) -> Result<Vec<SearchResult>> {
		let search = &self.cfg.search;
		let rows = self
			.guard(
				Stage::Substring.as_str(),
				self.collaborators.substring.substring(field, query, search.substring_limit),
			)
			.await?;

		Ok(rows
			.into_iter()
			.map(|row| {
				adapters::substring_result(
					row,
					field,
					search.substring_score,
					query,
					self.snippet_chars(),
				)
			})
			.collect())
	}

	/// Bounds a collaborator call by the configured stage timeout.
	async fn guard<T>(&self, operation: &str, call: impl Future<Output = Result<T>>) -> Result<T> {
		let limit = Duration::from_millis(self.cfg.search.stage_timeout_ms);

		tokio::time::timeout(limit, call)
			.await
			.map_err(|_| Error::Timeout { operation: operation.to_string() })?
	}

	fn snippet_chars(&self) -> usize {
		self.cfg.search.snippet_chars as usize
	}
}
