//! Heuristic topic labels for results the relevance analyzer did not touch.
//!
//! This is deliberately crude: normalize, drop short words and stopwords, keep the first few
//! distinct survivors in reading order.

use std::collections::HashSet;

pub const DEFAULT_MAX_TOPICS: usize = 4;

const MIN_TOPIC_CHARS: usize = 4;
const STOPWORDS: &[&str] = &[
	"about", "after", "again", "also", "because", "been", "before", "being", "between", "both",
	"chapter", "could", "does", "doing", "down", "during", "each", "even", "every", "from",
	"further", "have", "having", "here", "into", "itself", "just", "like", "made", "make", "many",
	"more", "most", "much", "must", "only", "other", "over", "same", "should", "some", "such",
	"than", "that", "their", "them", "then", "there", "these", "they", "this", "those", "through",
	"under", "until", "very", "want", "were", "what", "when", "where", "which", "while", "will",
	"with", "would", "your", "yours",
];

pub fn extract_topics(text: &str, max_topics: usize) -> Vec<String> {
	let normalized: String = text
		.to_lowercase()
		.chars()
		.filter(|ch| ch.is_alphanumeric() || ch.is_whitespace())
		.collect();
	let mut seen = HashSet::new();
	let mut out = Vec::new();

	for token in normalized.split_whitespace() {
		if out.len() >= max_topics {
			break;
		}
		if token.chars().count() < MIN_TOPIC_CHARS || STOPWORDS.contains(&token) {
			continue;
		}
		if seen.insert(token) {
			out.push(capitalize(token));
		}
	}

	out
}

fn capitalize(word: &str) -> String {
	let mut chars = word.chars();

	match chars.next() {
		Some(first) => first.to_uppercase().chain(chars).collect(),
		None => String::new(),
	}
}
