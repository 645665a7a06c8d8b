//! Row-to-result conversion for each retrieval stage.

use chapter_domain::{
	SearchResult, SearchType,
	snippet::build_snippet,
	topics::{DEFAULT_MAX_TOPICS, extract_topics},
};
use chapter_storage::{
	models::{ChapterRow, RankedMatch, VectorMatch},
	queries::SubstringField,
};

/// Vector stages score by cosine similarity, `1 - distance`.
pub(super) fn vector_result(
	found: VectorMatch,
	search_type: SearchType,
	query: &str,
	snippet_chars: usize,
) -> SearchResult {
	let similarity = (1.0 - found.distance).clamp(0.0, 1.0);
	let why_relevant = match search_type {
		SearchType::Summary =>
			format!("The chapter summary is semantically close to \"{query}\"."),
		SearchType::Chapter | SearchType::Fulltext =>
			format!("The chapter text discusses themes close to \"{query}\"."),
	};

	build(found.chapter, similarity, search_type, why_relevant, query, snippet_chars)
}

/// Full-text rank is used as-is; it is not rescaled against the vector stages.
pub(super) fn ranked_result(found: RankedMatch, query: &str, snippet_chars: usize) -> SearchResult {
	let why_relevant = format!("Matches the words of \"{query}\" in the chapter text.");

	build(found.chapter, found.rank, SearchType::Fulltext, why_relevant, query, snippet_chars)
}

pub(super) fn substring_result(
	row: ChapterRow,
	field: SubstringField,
	score: f32,
	query: &str,
	snippet_chars: usize,
) -> SearchResult {
	let place = match field {
		SubstringField::ChapterTitle => "chapter title",
		SubstringField::Body => "chapter text",
		SubstringField::BookTitle => "book title",
	};
	let why_relevant = format!("The {place} contains \"{query}\".");

	build(row, score, SearchType::Fulltext, why_relevant, query, snippet_chars)
}

fn build(
	row: ChapterRow,
	relevance_score: f32,
	search_type: SearchType,
	why_relevant: String,
	query: &str,
	snippet_chars: usize,
) -> SearchResult {
	let sources: Vec<&str> =
		[row.content.as_deref(), row.summary.as_deref()].into_iter().flatten().collect();
	let snippet = build_snippet(&sources, query, snippet_chars);
	let topic_source =
		row.summary.as_deref().or(row.content.as_deref()).unwrap_or(row.chapter_title.as_str());
	let key_topics = extract_topics(topic_source, DEFAULT_MAX_TOPICS);

	SearchResult {
		id: row.chapter_id,
		book_title: row.book_title,
		chapter_title: row.chapter_title,
		relevance_score,
		snippet,
		search_type,
		why_relevant,
		key_topics,
	}
}
