use serde_json::Value;
use sqlx::PgPool;
use time::OffsetDateTime;

use crate::Result;

/// Returns a live payload and bumps its hit counter.
pub async fn fetch_analysis_payload(
	pool: &PgPool,
	key: &str,
	now: OffsetDateTime,
) -> Result<Option<Value>> {
	let payload: Option<Value> = sqlx::query_scalar(
		"\
UPDATE analysis_cache
SET last_accessed_at = $1, hit_count = hit_count + 1
WHERE cache_key = $2 AND expires_at > $1
RETURNING payload",
	)
	.bind(now)
	.bind(key)
	.fetch_optional(pool)
	.await?;

	Ok(payload)
}

pub async fn store_analysis_payload(
	pool: &PgPool,
	key: &str,
	payload: &Value,
	now: OffsetDateTime,
	expires_at: OffsetDateTime,
) -> Result<()> {
	sqlx::query(
		"\
INSERT INTO analysis_cache (cache_key, payload, created_at, last_accessed_at, expires_at, hit_count)
VALUES ($1, $2, $3, $3, $4, 0)
ON CONFLICT (cache_key) DO UPDATE SET
	payload = EXCLUDED.payload,
	last_accessed_at = EXCLUDED.last_accessed_at,
	expires_at = EXCLUDED.expires_at,
	hit_count = 0",
	)
	.bind(key)
	.bind(payload)
	.bind(now)
	.bind(expires_at)
	.execute(pool)
	.await?;

	Ok(())
}

/// Deletes rows that expired at or before `now`.
pub async fn purge_expired_analysis(pool: &PgPool, now: OffsetDateTime) -> Result<u64> {
	let purged = sqlx::query("DELETE FROM analysis_cache WHERE expires_at <= $1")
		.bind(now)
		.execute(pool)
		.await?;

	Ok(purged.rows_affected())
}
