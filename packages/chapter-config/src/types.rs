use serde::Deserialize;
use serde_json::{Map, Value};

#[derive(Debug, Deserialize)]
pub struct Config {
	pub service: Service,
	pub storage: Storage,
	pub providers: Providers,
	#[serde(default)]
	pub search: Search,
	pub security: Security,
}

#[derive(Debug, Deserialize)]
pub struct Service {
	pub http_bind: String,
	pub log_level: String,
}

#[derive(Debug, Deserialize)]
pub struct Storage {
	pub postgres: Postgres,
	/// Dimension of both the summary and the chapter-body embedding columns.
	pub vector_dim: u32,
}

#[derive(Debug, Deserialize)]
pub struct Postgres {
	pub dsn: String,
	pub pool_max_conns: u32,
}

#[derive(Debug, Deserialize)]
pub struct Providers {
	pub embedding: EmbeddingProviderConfig,
	pub analyzer: LlmProviderConfig,
}

#[derive(Debug, Deserialize)]
pub struct EmbeddingProviderConfig {
	pub provider_id: String,
	pub api_base: String,
	pub api_key: String,
	pub path: String,
	pub model: String,
	pub dimensions: u32,
	pub timeout_ms: u64,
	#[serde(default)]
	pub default_headers: Map<String, Value>,
}

#[derive(Debug, Deserialize)]
pub struct LlmProviderConfig {
	pub provider_id: String,
	pub api_base: String,
	pub api_key: String,
	pub path: String,
	pub model: String,
	pub temperature: f32,
	pub timeout_ms: u64,
	#[serde(default)]
	pub default_headers: Map<String, Value>,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct Search {
	/// Minimum cosine similarity (0.0-1.0) for summary-vector candidates.
	pub summary_min_similarity: f32,
	pub summary_limit: u32,
	/// Minimum cosine similarity for chapter-body candidates. Looser than the summary
	/// threshold because full chapter text embeds noisier.
	pub chapter_min_similarity: f32,
	pub chapter_limit: u32,
	pub fulltext_limit: u32,
	pub substring_limit: u32,
	/// Constant score assigned to substring fallback hits.
	pub substring_score: f32,
	pub analysis_top_k: u32,
	pub analysis_level: String,
	pub snippet_chars: u32,
	pub stage_timeout_ms: u64,
	pub cache: SearchCache,
}
impl Default for Search {
	fn default() -> Self {
		Self {
			summary_min_similarity: 0.5,
			summary_limit: 50,
			chapter_min_similarity: 0.4,
			chapter_limit: 25,
			fulltext_limit: 20,
			substring_limit: 20,
			substring_score: 0.5,
			analysis_top_k: 10,
			analysis_level: "standard".to_string(),
			snippet_chars: 240,
			stage_timeout_ms: 10_000,
			cache: SearchCache::default(),
		}
	}
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct SearchCache {
	pub enabled: bool,
	pub analysis_ttl_days: i64,
	pub max_payload_bytes: Option<u64>,
}
impl Default for SearchCache {
	fn default() -> Self {
		Self { enabled: true, analysis_ttl_days: 7, max_payload_bytes: Some(262_144) }
	}
}

#[derive(Debug, Deserialize)]
pub struct Security {
	pub bind_localhost_only: bool,
	pub api_auth_token: Option<String>,
}
