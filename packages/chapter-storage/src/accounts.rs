use sqlx::PgPool;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::{Error, Result, models::Account};

pub async fn fetch_account(pool: &PgPool, account_id: Uuid) -> Result<Option<Account>> {
	let account = sqlx::query_as::<_, Account>(
		"\
SELECT account_id, plan, queries_used, updated_at
FROM accounts
WHERE account_id = $1",
	)
	.bind(account_id)
	.fetch_optional(pool)
	.await?;

	Ok(account)
}

pub async fn insert_account(
	pool: &PgPool,
	account_id: Uuid,
	plan: &str,
	now: OffsetDateTime,
) -> Result<()> {
	sqlx::query(
		"\
INSERT INTO accounts (account_id, plan, queries_used, created_at, updated_at)
VALUES ($1, $2, 0, $3, $3)
ON CONFLICT (account_id) DO UPDATE SET plan = EXCLUDED.plan, updated_at = EXCLUDED.updated_at",
	)
	.bind(account_id)
	.bind(plan)
	.bind(now)
	.execute(pool)
	.await?;

	Ok(())
}

/// Advances the counter from `expected` to `queries_used`.
///
/// Returns `false` when the stored counter no longer equals `expected`, so a concurrent search
/// cannot overwrite another one's increment.
pub async fn store_queries_used(
	pool: &PgPool,
	account_id: Uuid,
	expected: u32,
	queries_used: u32,
	now: OffsetDateTime,
) -> Result<bool> {
	let expected = storable(expected)?;
	let queries_used = storable(queries_used)?;
	let updated = sqlx::query_scalar::<_, Uuid>(
		"\
UPDATE accounts
SET queries_used = $1, updated_at = $2
WHERE account_id = $3 AND queries_used = $4
RETURNING account_id",
	)
	.bind(queries_used)
	.bind(now)
	.bind(account_id)
	.bind(expected)
	.fetch_optional(pool)
	.await?;

	if updated.is_some() {
		return Ok(true);
	}

	if fetch_account(pool, account_id).await?.is_none() {
		return Err(Error::NotFound(format!("Account {account_id} does not exist.")));
	}

	Ok(false)
}

fn storable(count: u32) -> Result<i32> {
	i32::try_from(count)
		.map_err(|_| Error::InvalidArgument("queries_used exceeds the storable range.".to_string()))
}
