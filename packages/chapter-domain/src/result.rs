use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub const MAX_KEY_TOPICS: usize = 5;

/// Which retrieval stage produced a result. Provenance only; ranking never reads it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SearchType {
	Summary,
	Chapter,
	Fulltext,
}
impl SearchType {
	pub fn as_str(self) -> &'static str {
		match self {
			Self::Summary => "summary",
			Self::Chapter => "chapter",
			Self::Fulltext => "fulltext",
		}
	}
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchResult {
	/// Chapter id; the deduplication key across stages.
	pub id: Uuid,
	pub book_title: String,
	pub chapter_title: String,
	/// Stage-specific score. Vector stages report cosine similarity, full-text reports the
	/// engine's rank, and the substring fallback reports a configured constant. The scales are
	/// not normalized against each other.
	pub relevance_score: f32,
	pub snippet: String,
	pub search_type: SearchType,
	pub why_relevant: String,
	pub key_topics: Vec<String>,
}
impl SearchResult {
	/// Replaces the explanation fields with analyzer output, keeping at most
	/// [`MAX_KEY_TOPICS`] topics.
	pub fn apply_analysis(&mut self, score: f32, reason: String, mut topics: Vec<String>) {
		topics.truncate(MAX_KEY_TOPICS);

		self.relevance_score = score;
		self.why_relevant = reason;
		self.key_topics = topics;
	}
}
