use std::collections::HashSet;

const ELLIPSIS: &str = "...";

/// Lower-cased ASCII alphanumeric terms of at least two characters, in query order.
pub fn query_terms(query: &str) -> Vec<String> {
	let mut normalized = String::with_capacity(query.len());

	for ch in query.chars() {
		if ch.is_ascii_alphanumeric() {
			normalized.push(ch.to_ascii_lowercase());
		} else {
			normalized.push(' ');
		}
	}

	let mut seen = HashSet::new();
	let mut out = Vec::new();

	for token in normalized.split_whitespace() {
		if token.len() < 2 {
			continue;
		}
		if seen.insert(token) {
			out.push(token.to_string());
		}
	}

	out
}

/// Builds an excerpt of at most `max_chars` characters (plus ellipsis markers).
///
/// The first source containing the query, or failing that any query term, wins and the window
/// is placed around the earliest match. When nothing matches, the excerpt is the leading text of
/// the first non-empty source.
pub fn build_snippet(sources: &[&str], query: &str, max_chars: usize) -> String {
	let phrase = query.trim().to_ascii_lowercase();
	let terms = query_terms(query);

	for source in sources.iter().filter(|source| !source.trim().is_empty()) {
		if let Some(byte_idx) = find_match(source, &phrase, &terms) {
			let match_char = source[..byte_idx].chars().count();

			return excerpt(source, match_char.saturating_sub(max_chars / 3), max_chars);
		}
	}

	sources
		.iter()
		.find(|source| !source.trim().is_empty())
		.map(|source| excerpt(source, 0, max_chars))
		.unwrap_or_default()
}

fn find_match(text: &str, phrase: &str, terms: &[String]) -> Option<usize> {
	// ASCII lower-casing keeps byte offsets aligned with `text`.
	let lowered = text.to_ascii_lowercase();

	if !phrase.is_empty()
		&& let Some(idx) = lowered.find(phrase)
	{
		return Some(idx);
	}

	terms.iter().filter_map(|term| lowered.find(term.as_str())).min()
}

fn excerpt(text: &str, start_char: usize, max_chars: usize) -> String {
	let total = text.chars().count();
	let end_char = (start_char + max_chars).min(total);
	let start_char = start_char.min(end_char.saturating_sub(max_chars));
	let start = byte_offset(text, start_char);
	let end = byte_offset(text, end_char);
	let body = text[start..end].split_whitespace().collect::<Vec<_>>().join(" ");
	let mut out = String::with_capacity(body.len() + ELLIPSIS.len() * 2);

	if start_char > 0 {
		out.push_str(ELLIPSIS);
	}

	out.push_str(&body);

	if end_char < total {
		out.push_str(ELLIPSIS);
	}

	out
}

fn byte_offset(text: &str, char_idx: usize) -> usize {
	text.char_indices().nth(char_idx).map(|(idx, _)| idx).unwrap_or(text.len())
}
