mod error;
mod types;

pub use error::{Error, Result};
pub use types::{
	Config, EmbeddingProviderConfig, LlmProviderConfig, Postgres, Providers, Search, SearchCache,
	Security, Service, Storage,
};

use std::{fs, path::Path};

pub const ANALYSIS_LEVELS: [&str; 3] = ["basic", "standard", "deep"];

pub fn load(path: &Path) -> Result<Config> {
	let raw = fs::read_to_string(path)
		.map_err(|err| Error::ReadConfig { path: path.to_path_buf(), source: err })?;
	let mut cfg: Config = toml::from_str(&raw)
		.map_err(|err| Error::ParseConfig { path: path.to_path_buf(), source: err })?;

	normalize(&mut cfg);

	validate(&cfg)?;

	Ok(cfg)
}

pub fn validate(cfg: &Config) -> Result<()> {
	if cfg.service.http_bind.trim().is_empty() {
		return Err(Error::validation("service.http_bind must be non-empty."));
	}
	if cfg.storage.postgres.pool_max_conns == 0 {
		return Err(Error::validation("storage.postgres.pool_max_conns must be greater than zero."));
	}
	if cfg.providers.embedding.dimensions == 0 {
		return Err(Error::validation(
			"providers.embedding.dimensions must be greater than zero.",
		));
	}
	if cfg.providers.embedding.dimensions != cfg.storage.vector_dim {
		return Err(Error::validation(
			"providers.embedding.dimensions must match storage.vector_dim.",
		));
	}

	let search = &cfg.search;

	for (label, value) in [
		("search.summary_min_similarity", search.summary_min_similarity),
		("search.chapter_min_similarity", search.chapter_min_similarity),
		("search.substring_score", search.substring_score),
	] {
		if !value.is_finite() {
			return Err(Error::validation(format!("{label} must be a finite number.")));
		}
		if !(0.0..=1.0).contains(&value) {
			return Err(Error::validation(format!("{label} must be in the range 0.0-1.0.")));
		}
	}
	for (label, value) in [
		("search.summary_limit", search.summary_limit),
		("search.chapter_limit", search.chapter_limit),
		("search.fulltext_limit", search.fulltext_limit),
		("search.substring_limit", search.substring_limit),
		("search.analysis_top_k", search.analysis_top_k),
		("search.snippet_chars", search.snippet_chars),
	] {
		if value == 0 {
			return Err(Error::validation(format!("{label} must be greater than zero.")));
		}
	}

	if !ANALYSIS_LEVELS.contains(&search.analysis_level.as_str()) {
		return Err(Error::validation(
			"search.analysis_level must be one of basic, standard, or deep.",
		));
	}
	if search.stage_timeout_ms == 0 {
		return Err(Error::validation("search.stage_timeout_ms must be greater than zero."));
	}
	if search.cache.analysis_ttl_days <= 0 {
		return Err(Error::validation("search.cache.analysis_ttl_days must be greater than zero."));
	}

	if let Some(max) = search.cache.max_payload_bytes
		&& max == 0
	{
		return Err(Error::validation("search.cache.max_payload_bytes must be greater than zero."));
	}

	for (label, key) in [
		("embedding", &cfg.providers.embedding.api_key),
		("analyzer", &cfg.providers.analyzer.api_key),
	] {
		if key.trim().is_empty() {
			return Err(Error::validation(format!("Provider {label} api_key must be non-empty.")));
		}
	}

	if !cfg.providers.analyzer.temperature.is_finite() {
		return Err(Error::validation("providers.analyzer.temperature must be a finite number."));
	}

	Ok(())
}

fn normalize(cfg: &mut Config) {
	if cfg.security.api_auth_token.as_deref().map(|token| token.trim().is_empty()).unwrap_or(false)
	{
		cfg.security.api_auth_token = None;
	}

	cfg.search.analysis_level = cfg.search.analysis_level.trim().to_ascii_lowercase();
}

#[cfg(test)]
mod tests {
	use super::*;

	const SAMPLE: &str = include_str!("../tests/fixtures/sample_config.toml");

	#[test]
	fn normalize_drops_blank_token_and_lowercases_level() {
		let mut cfg: Config = toml::from_str(SAMPLE).expect("Failed to parse sample config.");

		cfg.security.api_auth_token = Some("   ".to_string());
		cfg.search.analysis_level = " Deep ".to_string();

		normalize(&mut cfg);

		assert!(cfg.security.api_auth_token.is_none());
		assert_eq!(cfg.search.analysis_level, "deep");
	}
}
