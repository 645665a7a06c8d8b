use std::{
	collections::{HashMap, HashSet},
	sync::{
		Arc, Mutex,
		atomic::{AtomicUsize, Ordering},
	},
	time::Duration,
};

use serde_json::{Map, Value};
use uuid::Uuid;

use chapter_config::{
	Config, EmbeddingProviderConfig, LlmProviderConfig, Postgres, Providers, Search, Security,
	Service, Storage,
};
use chapter_domain::{Allowance, SearchType};
use chapter_providers::analyzer::{AnalysisCandidate, AnalyzedCandidate};
use chapter_service::{
	AnalysisCache, AnalysisLevel, BoxFuture, ChapterService, Collaborators, EmbeddingProvider,
	Error, FullTextStore, RelevanceAnalyzer, Result, SearchRequest, SubstringStore, VectorStore,
};
use chapter_storage::{
	models::{ChapterRow, RankedMatch, VectorMatch},
	queries::{NearestArgs, SubstringField, VectorColumn},
};

const VECTOR_DIM: u32 = 3;

#[derive(Default)]
struct Calls {
	embed: AtomicUsize,
	summary: AtomicUsize,
	chapter: AtomicUsize,
	fulltext: AtomicUsize,
	substring: AtomicUsize,
	analyze: AtomicUsize,
}
impl Calls {
	fn retrieval(&self) -> usize {
		self.summary.load(Ordering::SeqCst)
			+ self.chapter.load(Ordering::SeqCst)
			+ self.fulltext.load(Ordering::SeqCst)
			+ self.substring.load(Ordering::SeqCst)
	}
}

/// Canned collaborator behavior.
#[derive(Clone)]
enum Reply<T> {
	Rows(T),
	Fail,
	Stall,
}
impl<T> Reply<T>
where
	T: Clone,
{
	async fn resolve(&self, label: &str) -> Result<T> {
		match self {
			Self::Rows(rows) => Ok(rows.clone()),
			Self::Fail => Err(Error::Storage { message: format!("{label} is down.") }),
			Self::Stall => {
				tokio::time::sleep(Duration::from_secs(30)).await;

				Err(Error::Storage { message: format!("{label} stalled.") })
			},
		}
	}
}

struct SpyEmbedding {
	calls: Arc<Calls>,
	reply: Reply<Vec<f32>>,
}
impl EmbeddingProvider for SpyEmbedding {
	fn embed<'a>(
		&'a self,
		_cfg: &'a EmbeddingProviderConfig,
		texts: &'a [String],
	) -> BoxFuture<'a, Result<Vec<Vec<f32>>>> {
		self.calls.embed.fetch_add(1, Ordering::SeqCst);

		Box::pin(async move {
			let vector = self.reply.resolve("embedding").await?;

			Ok(texts.iter().map(|_| vector.clone()).collect())
		})
	}
}

struct SpyVectors {
	calls: Arc<Calls>,
	summary: Reply<Vec<VectorMatch>>,
	chapter: Reply<Vec<VectorMatch>>,
	chapter_scopes: Mutex<Vec<Option<Vec<Uuid>>>>,
}
impl VectorStore for SpyVectors {
	fn nearest<'a>(&'a self, args: NearestArgs<'a>) -> BoxFuture<'a, Result<Vec<VectorMatch>>> {
		Box::pin(async move {
			match args.column {
				VectorColumn::Summary => {
					self.calls.summary.fetch_add(1, Ordering::SeqCst);

					self.summary.resolve("summary vectors").await
				},
				VectorColumn::Content => {
					self.calls.chapter.fetch_add(1, Ordering::SeqCst);
					self.chapter_scopes
						.lock()
						.expect("Scope log lock poisoned.")
						.push(args.scope.map(<[Uuid]>::to_vec));

					self.chapter.resolve("chapter vectors").await
				},
			}
		})
	}
}

struct SpyFullText {
	calls: Arc<Calls>,
	reply: Reply<Vec<RankedMatch>>,
}
impl FullTextStore for SpyFullText {
	fn fulltext<'a>(
		&'a self,
		_query: &'a str,
		_limit: u32,
	) -> BoxFuture<'a, Result<Vec<RankedMatch>>> {
		self.calls.fulltext.fetch_add(1, Ordering::SeqCst);

		Box::pin(async move { self.reply.resolve("full-text").await })
	}
}

/// Answers body lookups with `body` and the title lookups with `titles`.
struct SpySubstring {
	calls: Arc<Calls>,
	body: Reply<Vec<ChapterRow>>,
	titles: Reply<Vec<ChapterRow>>,
}
impl SubstringStore for SpySubstring {
	fn substring<'a>(
		&'a self,
		field: SubstringField,
		_query: &'a str,
		_limit: u32,
	) -> BoxFuture<'a, Result<Vec<ChapterRow>>> {
		self.calls.substring.fetch_add(1, Ordering::SeqCst);

		Box::pin(async move {
			match field {
				SubstringField::Body => self.body.resolve("body substring").await,
				SubstringField::ChapterTitle | SubstringField::BookTitle =>
					self.titles.resolve("title substring").await,
			}
		})
	}
}

struct SpyAnalyzer {
	calls: Arc<Calls>,
	reply: Reply<Vec<AnalyzedCandidate>>,
	seen: Mutex<Vec<Uuid>>,
}
impl RelevanceAnalyzer for SpyAnalyzer {
	fn analyze<'a>(
		&'a self,
		_cfg: &'a LlmProviderConfig,
		_query: &'a str,
		candidates: &'a [AnalysisCandidate<'a>],
		_level: AnalysisLevel,
	) -> BoxFuture<'a, Result<Vec<AnalyzedCandidate>>> {
		self.calls.analyze.fetch_add(1, Ordering::SeqCst);
		self.seen
			.lock()
			.expect("Analyzer log lock poisoned.")
			.extend(candidates.iter().map(|candidate| candidate.id));

		Box::pin(async move { self.reply.resolve("analyzer").await })
	}
}

#[derive(Default)]
struct MemoryCache {
	entries: Mutex<HashMap<String, Value>>,
}
impl AnalysisCache for MemoryCache {
	fn get<'a>(&'a self, key: &'a str) -> BoxFuture<'a, Result<Option<Value>>> {
		let hit = self.entries.lock().expect("Cache lock poisoned.").get(key).cloned();

		Box::pin(async move { Ok(hit) })
	}

	fn put<'a>(&'a self, key: &'a str, payload: &'a Value) -> BoxFuture<'a, Result<()>> {
		self.entries.lock().expect("Cache lock poisoned.").insert(key.to_string(), payload.clone());

		Box::pin(async move { Ok(()) })
	}
}

struct Harness {
	calls: Arc<Calls>,
	embedding: Reply<Vec<f32>>,
	summary: Reply<Vec<VectorMatch>>,
	chapter: Reply<Vec<VectorMatch>>,
	fulltext: Reply<Vec<RankedMatch>>,
	substring: Reply<Vec<ChapterRow>>,
	substring_titles: Reply<Vec<ChapterRow>>,
	analyzer: Reply<Vec<AnalyzedCandidate>>,
	cache: Option<Arc<MemoryCache>>,
}
impl Harness {
	fn new() -> Self {
		Self {
			calls: Arc::new(Calls::default()),
			embedding: Reply::Rows(vec![0.1; VECTOR_DIM as usize]),
			summary: Reply::Rows(Vec::new()),
			chapter: Reply::Rows(Vec::new()),
			fulltext: Reply::Rows(Vec::new()),
			substring: Reply::Rows(Vec::new()),
			substring_titles: Reply::Rows(Vec::new()),
			analyzer: Reply::Fail,
			cache: None,
		}
	}

	fn build(self) -> (ChapterService, Arc<SpyVectors>, Arc<SpyAnalyzer>, Arc<Calls>) {
		let vectors = Arc::new(SpyVectors {
			calls: self.calls.clone(),
			summary: self.summary,
			chapter: self.chapter,
			chapter_scopes: Mutex::new(Vec::new()),
		});
		let analyzer = Arc::new(SpyAnalyzer {
			calls: self.calls.clone(),
			reply: self.analyzer,
			seen: Mutex::new(Vec::new()),
		});
		let collaborators = Collaborators {
			embedding: Arc::new(SpyEmbedding { calls: self.calls.clone(), reply: self.embedding }),
			vectors: vectors.clone(),
			fulltext: Arc::new(SpyFullText { calls: self.calls.clone(), reply: self.fulltext }),
			substring: Arc::new(SpySubstring {
				calls: self.calls.clone(),
				body: self.substring,
				titles: self.substring_titles,
			}),
			analyzer: analyzer.clone(),
			cache: self.cache.map(|cache| cache as Arc<dyn AnalysisCache>),
		};
		let service = ChapterService::with_collaborators(test_config(), collaborators);

		(service, vectors, analyzer, self.calls)
	}
}

fn test_config() -> Config {
	Config {
		service: Service { http_bind: "127.0.0.1:0".to_string(), log_level: "info".to_string() },
		storage: Storage {
			postgres: Postgres {
				dsn: "postgres://localhost/chapters".to_string(),
				pool_max_conns: 1,
			},
			vector_dim: VECTOR_DIM,
		},
		providers: Providers {
			embedding: EmbeddingProviderConfig {
				provider_id: "test".to_string(),
				api_base: "http://localhost".to_string(),
				api_key: "test-key".to_string(),
				path: "/embeddings".to_string(),
				model: "test-embedding".to_string(),
				dimensions: VECTOR_DIM,
				timeout_ms: 1_000,
				default_headers: Map::new(),
			},
			analyzer: LlmProviderConfig {
				provider_id: "test".to_string(),
				api_base: "http://localhost".to_string(),
				api_key: "test-key".to_string(),
				path: "/chat/completions".to_string(),
				model: "test-analyzer".to_string(),
				temperature: 0.0,
				timeout_ms: 1_000,
				default_headers: Map::new(),
			},
		},
		search: Search { stage_timeout_ms: 200, ..Search::default() },
		security: Security { bind_localhost_only: true, api_auth_token: None },
	}
}

fn chapter(id: u128, book: &str) -> ChapterRow {
	ChapterRow {
		chapter_id: Uuid::from_u128(id),
		book_title: book.to_string(),
		chapter_title: format!("Chapter {id}"),
		summary: Some(format!("How leaders build trust, part {id}.")),
		content: Some(format!("Leadership starts with trust. Section {id} explains why.")),
	}
}

fn vector_match(id: u128, book: &str, distance: f32) -> VectorMatch {
	VectorMatch { chapter: chapter(id, book), distance }
}

fn request(query: &str, plan: &str, queries_used: u32) -> SearchRequest {
	SearchRequest { query: query.to_string(), plan: plan.to_string(), queries_used }
}

fn ids(results: &[chapter_domain::SearchResult]) -> Vec<u128> {
	results.iter().map(|result| result.id.as_u128()).collect()
}

fn assert_ranked(results: &[chapter_domain::SearchResult]) {
	let unique: HashSet<Uuid> = results.iter().map(|result| result.id).collect();

	assert_eq!(unique.len(), results.len(), "Duplicate ids in {:?}.", ids(results));

	for pair in results.windows(2) {
		assert!(
			pair[0].relevance_score >= pair[1].relevance_score,
			"Results are not sorted: {:?}.",
			results.iter().map(|result| result.relevance_score).collect::<Vec<_>>()
		);
	}
}

#[tokio::test]
async fn exhausted_quota_skips_every_collaborator() {
	let (service, _, _, calls) = Harness::new().build();
	let response =
		service.perform_search(request("leadership", "free", 10)).await.expect("Search failed.");

	assert!(response.results.is_empty());
	assert!(response.upgrade_required);
	assert_eq!(response.queries_used, 10);
	assert_eq!(response.queries_remaining, Allowance::Limited(0));
	assert_eq!(response.upgrade_message.as_deref(), Some(response.tier.upgrade_message));
	assert_eq!(calls.embed.load(Ordering::SeqCst), 0);
	assert_eq!(calls.retrieval(), 0);
	assert_eq!(calls.analyze.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn unknown_plan_is_gated_like_free() {
	let (service, _, _, calls) = Harness::new().build();
	let response = service
		.perform_search(request("leadership", "enterprise", 10))
		.await
		.expect("Search failed.");

	assert!(response.upgrade_required);
	assert_eq!(response.tier.name, "free");
	assert_eq!(calls.retrieval(), 0);
}

#[tokio::test]
async fn unlimited_tier_is_never_gated() {
	let mut harness = Harness::new();

	harness.summary = Reply::Rows(vec![vector_match(1, "Book A", 0.2)]);

	let (service, _, _, _) = harness.build();
	let response = service
		.perform_search(request("leadership", "premium", 100_000))
		.await
		.expect("Search failed.");

	assert!(!response.upgrade_required);
	assert_eq!(response.queries_used, 100_001);
	assert_eq!(response.queries_remaining, Allowance::Unlimited);
}

#[tokio::test]
async fn blank_query_is_rejected_before_any_call() {
	let (service, _, _, calls) = Harness::new().build();
	let err = service
		.perform_search(request("   ", "premium", 0))
		.await
		.expect_err("Blank query should be rejected.");

	assert!(matches!(err, Error::InvalidRequest { .. }), "Unexpected error: {err:?}.");
	assert_eq!(calls.embed.load(Ordering::SeqCst), 0);
	assert_eq!(calls.retrieval(), 0);
}

#[tokio::test]
async fn failed_embedding_falls_through_to_substring_search() {
	let mut harness = Harness::new();

	harness.embedding = Reply::Fail;
	harness.fulltext = Reply::Rows(Vec::new());
	harness.substring =
		Reply::Rows(vec![chapter(1, "Book A"), chapter(2, "Book A"), chapter(3, "Book B")]);

	let (service, _, _, calls) = harness.build();
	let response =
		service.perform_search(request("trust", "free", 0)).await.expect("Search failed.");

	assert_eq!(ids(&response.results), vec![1, 2, 3]);
	assert!(response.results.iter().all(|result| result.relevance_score == 0.5));
	assert!(response.results.iter().all(|result| result.search_type == SearchType::Fulltext));
	assert_eq!(calls.summary.load(Ordering::SeqCst), 0);
	assert_eq!(calls.chapter.load(Ordering::SeqCst), 0);
	assert_eq!(calls.fulltext.load(Ordering::SeqCst), 1);
	assert_eq!(calls.substring.load(Ordering::SeqCst), SubstringField::ALL.len());
	assert_eq!(response.total_books_found, 2);
}

#[tokio::test]
async fn substring_search_is_skipped_when_earlier_stages_found_results() {
	let mut harness = Harness::new();

	harness.summary = Reply::Rows(vec![vector_match(1, "Book A", 0.3)]);
	harness.substring = Reply::Rows(vec![chapter(9, "Book Z")]);

	let (service, _, _, calls) = harness.build();
	let response =
		service.perform_search(request("trust", "free", 0)).await.expect("Search failed.");

	assert_eq!(ids(&response.results), vec![1]);
	assert_eq!(calls.substring.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn chapter_search_is_scoped_to_summary_candidates() {
	let mut harness = Harness::new();

	harness.summary = Reply::Rows(vec![
		vector_match(1, "Book A", 0.2),
		vector_match(2, "Book A", 0.3),
		vector_match(3, "Book B", 0.4),
	]);
	harness.chapter = Reply::Rows(vec![vector_match(2, "Book A", 0.1)]);

	let (service, vectors, _, _) = harness.build();
	let response =
		service.perform_search(request("leadership", "free", 0)).await.expect("Search failed.");
	let scopes = vectors.chapter_scopes.lock().expect("Scope log lock poisoned.").clone();

	assert_eq!(
		scopes,
		vec![Some(vec![Uuid::from_u128(1), Uuid::from_u128(2), Uuid::from_u128(3)])]
	);
	// Chapter 2 keeps the better chapter-body score.
	assert_eq!(ids(&response.results), vec![2, 1, 3]);
	assert_eq!(response.results[0].search_type, SearchType::Chapter);
	assert_ranked(&response.results);
}

#[tokio::test]
async fn chapter_search_is_skipped_when_summary_search_fails() {
	let mut harness = Harness::new();

	harness.summary = Reply::Fail;
	harness.substring = Reply::Rows(vec![chapter(4, "Book A")]);

	let (service, _, _, calls) = harness.build();
	let response =
		service.perform_search(request("leadership", "free", 0)).await.expect("Search failed.");

	assert_eq!(calls.chapter.load(Ordering::SeqCst), 0);
	assert_eq!(ids(&response.results), vec![4]);
}

#[tokio::test]
async fn free_tier_leadership_search_truncates_after_counting() {
	let mut harness = Harness::new();
	let summary =
		(1..=8).map(|id| vector_match(id, &format!("Book {}", id % 3), 0.2 + id as f32 * 0.02));
	let chapter = (3..=8)
		.map(|id| vector_match(id, &format!("Book {}", id % 3), 0.3))
		.chain([vector_match(9, "Book 9", 0.25), vector_match(10, "Book 10", 0.35)]);

	harness.summary = Reply::Rows(summary.collect());
	harness.chapter = Reply::Rows(chapter.collect());

	let (service, _, _, calls) = harness.build();
	let response =
		service.perform_search(request("leadership", "free", 0)).await.expect("Search failed.");

	assert_eq!(response.tier.name, "free");
	assert_eq!(response.total_chapters_found, 10);
	assert_eq!(response.total_books_found, 5);
	assert_eq!(response.results.len(), 5);
	assert_eq!(response.queries_used, 1);
	assert_eq!(response.queries_remaining, Allowance::Limited(9));
	assert!(!response.upgrade_required);
	assert!(response.upgrade_message.is_none());
	assert_eq!(calls.fulltext.load(Ordering::SeqCst), 0);
	assert_eq!(calls.analyze.load(Ordering::SeqCst), 0);
	assert_ranked(&response.results);
}

#[tokio::test]
async fn analyzer_failure_leaves_results_untouched() {
	let mut baseline = Harness::new();
	let summary: Vec<VectorMatch> =
		(1..=4).map(|id| vector_match(id, "Book A", 0.1 * id as f32)).collect();

	baseline.summary = Reply::Rows(summary.clone());

	let (service, _, _, _) = baseline.build();
	let expected = service
		.perform_search(request("leadership", "basic", 0))
		.await
		.expect("Search failed.")
		.results;
	let mut failing = Harness::new();

	failing.summary = Reply::Rows(summary);
	failing.analyzer = Reply::Fail;

	let (service, _, _, calls) = failing.build();
	let response =
		service.perform_search(request("leadership", "premium", 0)).await.expect("Search failed.");

	assert_eq!(calls.analyze.load(Ordering::SeqCst), 1);
	assert_eq!(response.results, expected);
}

#[tokio::test]
async fn analyzer_rewrites_top_candidates_and_reranks() {
	let mut harness = Harness::new();

	harness.summary =
		Reply::Rows((1..=12).map(|id| vector_match(id, "Book A", 0.01 * id as f32)).collect());
	harness.analyzer = Reply::Rows(vec![AnalyzedCandidate {
		id: Uuid::from_u128(5),
		enhanced_score: 1.0,
		relevance_reason: "Centres on leadership under pressure.".to_string(),
		key_topics: vec!["Leadership".to_string(), "Pressure".to_string()],
	}]);

	let (service, _, analyzer, _) = harness.build();
	let response =
		service.perform_search(request("leadership", "premium", 0)).await.expect("Search failed.");
	let seen = analyzer.seen.lock().expect("Analyzer log lock poisoned.").clone();

	assert_eq!(seen, (1..=10).map(Uuid::from_u128).collect::<Vec<_>>());
	assert_eq!(response.results[0].id, Uuid::from_u128(5));
	assert_eq!(response.results[0].why_relevant, "Centres on leadership under pressure.");
	assert_eq!(response.results[0].key_topics, vec!["Leadership", "Pressure"]);
	assert_eq!(response.total_chapters_found, 12);
	assert_ranked(&response.results);
}

#[tokio::test]
async fn analyzer_output_past_top_k_is_ignored() {
	let mut harness = Harness::new();

	harness.summary =
		Reply::Rows((1..=12).map(|id| vector_match(id, "Book A", 0.01 * id as f32)).collect());
	harness.analyzer = Reply::Rows(vec![AnalyzedCandidate {
		id: Uuid::from_u128(12),
		enhanced_score: 1.0,
		relevance_reason: "Rewritten outside the analyzed slice.".to_string(),
		key_topics: vec!["Leadership".to_string()],
	}]);

	let (service, _, _, calls) = harness.build();
	let response =
		service.perform_search(request("leadership", "premium", 0)).await.expect("Search failed.");
	let last = response.results.last().expect("Expected twelve results.");

	assert_eq!(calls.analyze.load(Ordering::SeqCst), 1);
	assert_eq!(ids(&response.results), (1..=12).collect::<Vec<_>>());
	assert_eq!(last.id, Uuid::from_u128(12));
	assert!((last.relevance_score - 0.88).abs() < 1e-6);
	assert_ne!(last.why_relevant, "Rewritten outside the analyzed slice.");
	assert_ranked(&response.results);
}

#[tokio::test]
async fn cached_analysis_skips_the_analyzer() {
	let cache = Arc::new(MemoryCache::default());
	let analyzed = vec![AnalyzedCandidate {
		id: Uuid::from_u128(2),
		enhanced_score: 0.99,
		relevance_reason: "Cached reason.".to_string(),
		key_topics: vec!["Trust".to_string()],
	}];
	let summary: Vec<VectorMatch> =
		(1..=3).map(|id| vector_match(id, "Book A", 0.1 * id as f32)).collect();
	let mut first = Harness::new();

	first.summary = Reply::Rows(summary.clone());
	first.analyzer = Reply::Rows(analyzed);
	first.cache = Some(cache.clone());

	let (service, _, _, calls) = first.build();
	let warm =
		service.perform_search(request("leadership", "premium", 0)).await.expect("Search failed.");

	assert_eq!(calls.analyze.load(Ordering::SeqCst), 1);

	let mut second = Harness::new();

	second.summary = Reply::Rows(summary);
	second.analyzer = Reply::Fail;
	second.cache = Some(cache);

	let (service, _, _, calls) = second.build();
	let cached =
		service.perform_search(request("leadership", "premium", 0)).await.expect("Search failed.");

	assert_eq!(calls.analyze.load(Ordering::SeqCst), 0);
	assert_eq!(cached.results, warm.results);
	assert_eq!(cached.results[0].why_relevant, "Cached reason.");
}

#[tokio::test]
async fn stalled_stage_degrades_to_the_next_fallback() {
	let mut harness = Harness::new();

	harness.embedding = Reply::Stall;
	harness.fulltext = Reply::Rows(vec![RankedMatch { chapter: chapter(7, "Book A"), rank: 0.4 }]);

	let (service, _, _, calls) = harness.build();
	let response =
		service.perform_search(request("leadership", "free", 0)).await.expect("Search failed.");

	assert_eq!(ids(&response.results), vec![7]);
	assert_eq!(calls.summary.load(Ordering::SeqCst), 0);
	assert_eq!(calls.substring.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn total_outage_is_an_error() {
	let mut harness = Harness::new();

	harness.embedding = Reply::Fail;
	harness.fulltext = Reply::Fail;
	harness.substring = Reply::Fail;
	harness.substring_titles = Reply::Fail;

	let (service, _, _, calls) = harness.build();
	let err = service
		.perform_search(request("leadership", "basic", 0))
		.await
		.expect_err("Outage should surface.");

	assert!(matches!(err, Error::RetrievalUnavailable { .. }), "Unexpected error: {err:?}.");
	assert_eq!(calls.substring.load(Ordering::SeqCst), SubstringField::ALL.len());
}

#[tokio::test]
async fn substring_rows_survive_failed_title_variants() {
	let mut harness = Harness::new();

	harness.embedding = Reply::Fail;
	harness.fulltext = Reply::Fail;
	harness.substring = Reply::Rows(vec![chapter(6, "Book A")]);
	harness.substring_titles = Reply::Fail;

	let (service, _, _, calls) = harness.build();
	let response =
		service.perform_search(request("trust", "free", 0)).await.expect("Search failed.");

	assert_eq!(ids(&response.results), vec![6]);
	assert_eq!(calls.substring.load(Ordering::SeqCst), SubstringField::ALL.len());
}

#[tokio::test]
async fn one_healthy_empty_substring_variant_is_an_empty_success() {
	let mut harness = Harness::new();

	harness.embedding = Reply::Fail;
	harness.fulltext = Reply::Fail;
	harness.substring = Reply::Rows(Vec::new());
	harness.substring_titles = Reply::Fail;

	let (service, _, _, _) = harness.build();
	let response =
		service.perform_search(request("trust", "free", 2)).await.expect("Search failed.");

	assert!(response.results.is_empty());
	assert_eq!(response.queries_used, 3);
}

#[tokio::test]
async fn no_matches_with_healthy_stores_is_an_empty_success() {
	let (service, _, _, _) = Harness::new().build();
	let response =
		service.perform_search(request("zebra", "basic", 3)).await.expect("Search failed.");

	assert!(response.results.is_empty());
	assert_eq!(response.total_chapters_found, 0);
	assert_eq!(response.queries_used, 4);
}

#[tokio::test]
async fn wrong_embedding_dimension_is_treated_as_missing() {
	let mut harness = Harness::new();

	harness.embedding = Reply::Rows(vec![0.1; VECTOR_DIM as usize + 1]);
	harness.fulltext = Reply::Rows(vec![RankedMatch { chapter: chapter(3, "Book A"), rank: 0.2 }]);

	let (service, _, _, calls) = harness.build();
	let response =
		service.perform_search(request("leadership", "free", 0)).await.expect("Search failed.");

	assert_eq!(ids(&response.results), vec![3]);
	assert_eq!(calls.summary.load(Ordering::SeqCst), 0);
	assert_eq!(calls.fulltext.load(Ordering::SeqCst), 1);
}
