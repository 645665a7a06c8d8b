//! Postgres-backed collaborators for the search pipeline.

use serde_json::Value;
use sqlx::PgPool;
use time::{Duration, OffsetDateTime};

use chapter_storage::{
	cache,
	models::{ChapterRow, RankedMatch, VectorMatch},
	queries::{self, NearestArgs, SubstringField},
};

use crate::{
	AnalysisCache, BoxFuture, Error, FullTextStore, Result, SubstringStore, VectorStore,
};

pub struct PgCorpus {
	pool: PgPool,
}
impl PgCorpus {
	pub fn new(pool: PgPool) -> Self {
		Self { pool }
	}
}
impl VectorStore for PgCorpus {
	fn nearest<'a>(&'a self, args: NearestArgs<'a>) -> BoxFuture<'a, Result<Vec<VectorMatch>>> {
		Box::pin(async move {
			queries::nearest_chapters(&self.pool, args).await.map_err(Error::from)
		})
	}
}
impl FullTextStore for PgCorpus {
	fn fulltext<'a>(
		&'a self,
		query: &'a str,
		limit: u32,
	) -> BoxFuture<'a, Result<Vec<RankedMatch>>> {
		Box::pin(async move {
			queries::fulltext_chapters(&self.pool, query, limit).await.map_err(Error::from)
		})
	}
}
impl SubstringStore for PgCorpus {
	fn substring<'a>(
		&'a self,
		field: SubstringField,
		query: &'a str,
		limit: u32,
	) -> BoxFuture<'a, Result<Vec<ChapterRow>>> {
		Box::pin(async move {
			queries::substring_chapters(&self.pool, field, query, limit).await.map_err(Error::from)
		})
	}
}

pub struct PgAnalysisCache {
	pool: PgPool,
	ttl: Duration,
	max_payload_bytes: Option<u64>,
}
impl PgAnalysisCache {
	pub fn new(pool: PgPool, cfg: &chapter_config::SearchCache) -> Self {
		Self {
			pool,
			ttl: Duration::days(cfg.analysis_ttl_days),
			max_payload_bytes: cfg.max_payload_bytes,
		}
	}
}
impl AnalysisCache for PgAnalysisCache {
	fn get<'a>(&'a self, key: &'a str) -> BoxFuture<'a, Result<Option<Value>>> {
		Box::pin(async move {
			let now = OffsetDateTime::now_utc();

			cache::fetch_analysis_payload(&self.pool, key, now).await.map_err(Error::from)
		})
	}

	fn put<'a>(&'a self, key: &'a str, payload: &'a Value) -> BoxFuture<'a, Result<()>> {
		Box::pin(async move {
			if let Some(max) = self.max_payload_bytes {
				let size = serde_json::to_vec(payload)
					.map_err(|err| Error::Storage {
						message: format!("Failed to encode cache payload: {err}"),
					})?
					.len();

				if size as u64 > max {
					tracing::debug!(cache_key = key, size, "Analysis payload exceeds cache limit.");

					return Ok(());
				}
			}

			let now = OffsetDateTime::now_utc();

			cache::store_analysis_payload(&self.pool, key, payload, now, now + self.ttl).await?;

			let purged = cache::purge_expired_analysis(&self.pool, now).await?;

			if purged > 0 {
				tracing::debug!(purged, "Expired analysis cache rows removed.");
			}

			Ok(())
		})
	}
}
