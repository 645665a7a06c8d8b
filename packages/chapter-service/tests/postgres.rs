use std::sync::Arc;

use serde_json::Map;
use uuid::Uuid;

use chapter_config::{
	Config, EmbeddingProviderConfig, LlmProviderConfig, Postgres, Providers, Search, Security,
	Service, Storage,
};
use chapter_service::{
	BoxFuture, ChapterService, Collaborators, EmbeddingProvider, Result, SearchRequest,
};
use chapter_storage::{
	db::Db,
	models::{NewBook, NewChapter},
	queries,
};
use chapter_testkit::TestDatabase;

const VECTOR_DIM: u32 = 3;

struct StubEmbedding {
	vector: Vec<f32>,
}
impl EmbeddingProvider for StubEmbedding {
	fn embed<'a>(
		&'a self,
		_cfg: &'a EmbeddingProviderConfig,
		texts: &'a [String],
	) -> BoxFuture<'a, Result<Vec<Vec<f32>>>> {
		let vectors = texts.iter().map(|_| self.vector.clone()).collect();

		Box::pin(async move { Ok(vectors) })
	}
}

fn config(dsn: &str) -> Config {
	// Nothing listens on the discard port, so real provider calls fail fast.
	let api_base = "http://127.0.0.1:9".to_string();

	Config {
		service: Service { http_bind: "127.0.0.1:0".to_string(), log_level: "info".to_string() },
		storage: Storage {
			postgres: Postgres { dsn: dsn.to_string(), pool_max_conns: 4 },
			vector_dim: VECTOR_DIM,
		},
		providers: Providers {
			embedding: EmbeddingProviderConfig {
				provider_id: "test".to_string(),
				api_base: api_base.clone(),
				api_key: "test-key".to_string(),
				path: "/embeddings".to_string(),
				model: "test-embedding".to_string(),
				dimensions: VECTOR_DIM,
				timeout_ms: 500,
				default_headers: Map::new(),
			},
			analyzer: LlmProviderConfig {
				provider_id: "test".to_string(),
				api_base,
				api_key: "test-key".to_string(),
				path: "/chat/completions".to_string(),
				model: "test-analyzer".to_string(),
				temperature: 0.0,
				timeout_ms: 500,
				default_headers: Map::new(),
			},
		},
		search: Search::default(),
		security: Security { bind_localhost_only: true, api_auth_token: None },
	}
}

async fn seed(db: &Db) {
	let book_id = Uuid::from_u128(500);

	queries::insert_book(
		&db.pool,
		&NewBook { book_id, title: "The Speed of Trust".to_string(), author: None },
	)
	.await
	.expect("Failed to insert book.");

	let chapters = [
		(1, "The One Thing", [1.0, 0.0, 0.0]),
		(2, "Self Trust", [0.95, 0.05, 0.0]),
		(3, "Market Trust", [0.0, 0.0, 1.0]),
	];

	for (number, title, vector) in chapters {
		queries::insert_chapter(
			&db.pool,
			&NewChapter {
				chapter_id: Uuid::from_u128(number),
				book_id,
				chapter_number: number as i32,
				title: title.to_string(),
				summary: Some(format!("{title} explains how credibility compounds.")),
				content: Some(format!("{title}: trust is a function of character and competence.")),
				summary_embedding: Some(vector.to_vec()),
				content_embedding: Some(vector.to_vec()),
			},
		)
		.await
		.expect("Failed to insert chapter.");
	}
}

#[tokio::test]
#[ignore = "Requires external Postgres with pgvector. Set CHAPTER_PG_DSN to run."]
async fn free_search_over_postgres_uses_vector_stages() {
	let Some(base_dsn) = chapter_testkit::env_dsn() else {
		eprintln!("Skipping free_search_over_postgres_uses_vector_stages; set CHAPTER_PG_DSN.");

		return;
	};
	let test_db = TestDatabase::new(&base_dsn).await.expect("Failed to create test database.");
	let cfg = config(test_db.dsn());
	let db = Db::connect(&cfg.storage.postgres).await.expect("Failed to connect to Postgres.");

	db.ensure_schema(VECTOR_DIM).await.expect("Failed to ensure schema.");

	seed(&db).await;

	let mut collaborators = Collaborators::postgres(&cfg, db.pool.clone());

	collaborators.embedding = Arc::new(StubEmbedding { vector: vec![1.0, 0.0, 0.0] });

	let service = ChapterService::with_collaborators(cfg, collaborators);
	let response = service
		.perform_search(SearchRequest {
			query: "trust".to_string(),
			plan: "free".to_string(),
			queries_used: 2,
		})
		.await
		.expect("Search failed.");
	let ids: Vec<_> = response.results.iter().map(|result| result.id.as_u128()).collect();

	assert_eq!(ids, vec![1, 2], "Orthogonal chapter must not pass the similarity threshold.");
	assert_eq!(response.queries_used, 3);
	assert_eq!(response.total_books_found, 1);

	drop(service);
	drop(db);

	test_db.cleanup().await.expect("Failed to cleanup test database.");
}

#[tokio::test]
#[ignore = "Requires external Postgres with pgvector. Set CHAPTER_PG_DSN to run."]
async fn unreachable_embedding_falls_back_to_fulltext() {
	let Some(base_dsn) = chapter_testkit::env_dsn() else {
		eprintln!("Skipping unreachable_embedding_falls_back_to_fulltext; set CHAPTER_PG_DSN.");

		return;
	};
	let test_db = TestDatabase::new(&base_dsn).await.expect("Failed to create test database.");
	let cfg = config(test_db.dsn());
	let db = Db::connect(&cfg.storage.postgres).await.expect("Failed to connect to Postgres.");

	db.ensure_schema(VECTOR_DIM).await.expect("Failed to ensure schema.");

	seed(&db).await;

	let service = ChapterService::new(cfg, db.pool.clone());
	let response = service
		.perform_search(SearchRequest {
			query: "market".to_string(),
			plan: "free".to_string(),
			queries_used: 0,
		})
		.await
		.expect("Search failed.");

	assert_eq!(response.results.len(), 1);
	assert_eq!(response.results[0].id, Uuid::from_u128(3));

	drop(service);
	drop(db);

	test_db.cleanup().await.expect("Failed to cleanup test database.");
}
