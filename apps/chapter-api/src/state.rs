use std::sync::Arc;

use time::OffsetDateTime;
use uuid::Uuid;

use chapter_service::{BoxFuture, ChapterService, Error, Result};
use chapter_storage::{accounts, db::Db, models::Account};

/// Where the per-account plan and query counter live.
pub trait AccountStore
where
	Self: Send + Sync,
{
	fn fetch<'a>(&'a self, account_id: Uuid) -> BoxFuture<'a, Result<Option<Account>>>;

	/// Compare-and-set write of the counter; `false` means another search moved it first.
	fn store_queries_used<'a>(
		&'a self,
		account_id: Uuid,
		expected: u32,
		queries_used: u32,
	) -> BoxFuture<'a, Result<bool>>;
}

pub struct PgAccounts {
	db: Db,
}
impl PgAccounts {
	pub fn new(db: Db) -> Self {
		Self { db }
	}
}
impl AccountStore for PgAccounts {
	fn fetch<'a>(&'a self, account_id: Uuid) -> BoxFuture<'a, Result<Option<Account>>> {
		Box::pin(async move {
			accounts::fetch_account(&self.db.pool, account_id).await.map_err(Error::from)
		})
	}

	fn store_queries_used<'a>(
		&'a self,
		account_id: Uuid,
		expected: u32,
		queries_used: u32,
	) -> BoxFuture<'a, Result<bool>> {
		Box::pin(async move {
			let now = OffsetDateTime::now_utc();

			accounts::store_queries_used(&self.db.pool, account_id, expected, queries_used, now)
				.await
				.map_err(Error::from)
		})
	}
}

#[derive(Clone)]
pub struct AppState {
	pub service: Arc<ChapterService>,
	pub accounts: Arc<dyn AccountStore>,
	pub api_auth_token: Option<Arc<str>>,
}
impl AppState {
	pub async fn new(config: chapter_config::Config) -> color_eyre::Result<Self> {
		let db = Db::connect(&config.storage.postgres).await?;

		db.ensure_schema(config.storage.vector_dim).await?;

		let api_auth_token = config.security.api_auth_token.as_deref().map(Arc::from);
		let service = ChapterService::new(config, db.pool.clone());
		let accounts = Arc::new(PgAccounts::new(db));

		Ok(Self { service: Arc::new(service), accounts, api_auth_token })
	}

	pub fn from_parts(
		service: ChapterService,
		accounts: Arc<dyn AccountStore>,
		api_auth_token: Option<&str>,
	) -> Self {
		Self { service: Arc::new(service), accounts, api_auth_token: api_auth_token.map(Arc::from) }
	}
}
