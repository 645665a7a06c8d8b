pub mod corpus;
pub mod search;

mod error;

pub use error::{Error, Result};
pub use search::{AnalysisLevel, SearchRequest, Stage, StagePlan, TieredSearchResponse};

use std::{future::Future, pin::Pin, sync::Arc};

use serde_json::Value;
use sqlx::PgPool;

use chapter_config::{Config, EmbeddingProviderConfig, LlmProviderConfig};
use chapter_providers::{
	analyzer::{self, AnalysisCandidate, AnalyzedCandidate},
	embedding,
};
use chapter_storage::{
	models::{ChapterRow, RankedMatch, VectorMatch},
	queries::{NearestArgs, SubstringField},
};

use crate::corpus::{PgAnalysisCache, PgCorpus};

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

pub trait EmbeddingProvider
where
	Self: Send + Sync,
{
	fn embed<'a>(
		&'a self,
		cfg: &'a EmbeddingProviderConfig,
		texts: &'a [String],
	) -> BoxFuture<'a, Result<Vec<Vec<f32>>>>;
}

pub trait RelevanceAnalyzer
where
	Self: Send + Sync,
{
	fn analyze<'a>(
		&'a self,
		cfg: &'a LlmProviderConfig,
		query: &'a str,
		candidates: &'a [AnalysisCandidate<'a>],
		level: AnalysisLevel,
	) -> BoxFuture<'a, Result<Vec<AnalyzedCandidate>>>;
}

/// Cosine-distance search over the summary or chapter-body embeddings.
pub trait VectorStore
where
	Self: Send + Sync,
{
	fn nearest<'a>(&'a self, args: NearestArgs<'a>) -> BoxFuture<'a, Result<Vec<VectorMatch>>>;
}

pub trait FullTextStore
where
	Self: Send + Sync,
{
	fn fulltext<'a>(&'a self, query: &'a str, limit: u32)
	-> BoxFuture<'a, Result<Vec<RankedMatch>>>;
}

/// Unranked, case-insensitive substring lookup.
pub trait SubstringStore
where
	Self: Send + Sync,
{
	fn substring<'a>(
		&'a self,
		field: SubstringField,
		query: &'a str,
		limit: u32,
	) -> BoxFuture<'a, Result<Vec<ChapterRow>>>;
}

pub trait AnalysisCache
where
	Self: Send + Sync,
{
	fn get<'a>(&'a self, key: &'a str) -> BoxFuture<'a, Result<Option<Value>>>;

	fn put<'a>(&'a self, key: &'a str, payload: &'a Value) -> BoxFuture<'a, Result<()>>;
}

#[derive(Clone)]
pub struct Collaborators {
	pub embedding: Arc<dyn EmbeddingProvider>,
	pub vectors: Arc<dyn VectorStore>,
	pub fulltext: Arc<dyn FullTextStore>,
	pub substring: Arc<dyn SubstringStore>,
	pub analyzer: Arc<dyn RelevanceAnalyzer>,
	pub cache: Option<Arc<dyn AnalysisCache>>,
}
impl Collaborators {
	/// HTTP providers plus Postgres-backed stores and analysis cache.
	pub fn postgres(cfg: &Config, pool: PgPool) -> Self {
		let providers = Arc::new(DefaultProviders);
		let corpus = Arc::new(PgCorpus::new(pool.clone()));
		let cache: Option<Arc<dyn AnalysisCache>> = cfg.search.cache.enabled.then(|| {
			Arc::new(PgAnalysisCache::new(pool, &cfg.search.cache)) as Arc<dyn AnalysisCache>
		});

		Self {
			embedding: providers.clone(),
			vectors: corpus.clone(),
			fulltext: corpus.clone(),
			substring: corpus,
			analyzer: providers,
			cache,
		}
	}
}

pub struct ChapterService {
	pub cfg: Config,
	pub collaborators: Collaborators,
}
impl ChapterService {
	pub fn new(cfg: Config, pool: PgPool) -> Self {
		let collaborators = Collaborators::postgres(&cfg, pool);

		Self { cfg, collaborators }
	}

	pub fn with_collaborators(cfg: Config, collaborators: Collaborators) -> Self {
		Self { cfg, collaborators }
	}
}

struct DefaultProviders;
impl EmbeddingProvider for DefaultProviders {
	fn embed<'a>(
		&'a self,
		cfg: &'a EmbeddingProviderConfig,
		texts: &'a [String],
	) -> BoxFuture<'a, Result<Vec<Vec<f32>>>> {
		Box::pin(async move { embedding::embed(cfg, texts).await.map_err(Error::from) })
	}
}
impl RelevanceAnalyzer for DefaultProviders {
	fn analyze<'a>(
		&'a self,
		cfg: &'a LlmProviderConfig,
		query: &'a str,
		candidates: &'a [AnalysisCandidate<'a>],
		level: AnalysisLevel,
	) -> BoxFuture<'a, Result<Vec<AnalyzedCandidate>>> {
		Box::pin(async move {
			analyzer::analyze(cfg, query, candidates, level.as_str()).await.map_err(Error::from)
		})
	}
}
