use std::{
	cmp::Ordering,
	collections::{HashMap, HashSet},
};

use uuid::Uuid;

use crate::SearchResult;

/// Merges one stage's results into the accumulated list.
///
/// New ids are appended. A duplicate id replaces the existing entry only when its score is
/// strictly greater. The returned list is sorted by descending score; the sort is stable, so
/// merging an empty batch leaves an already-merged list untouched.
pub fn merge_results(
	mut existing: Vec<SearchResult>,
	incoming: Vec<SearchResult>,
) -> Vec<SearchResult> {
	let mut index_by_id: HashMap<Uuid, usize> =
		existing.iter().enumerate().map(|(idx, result)| (result.id, idx)).collect();

	for result in incoming {
		match index_by_id.get(&result.id) {
			Some(&idx) =>
				if result.relevance_score > existing[idx].relevance_score {
					existing[idx] = result;
				},
			None => {
				index_by_id.insert(result.id, existing.len());
				existing.push(result);
			},
		}
	}

	existing.sort_by(|a, b| cmp_score_desc(a.relevance_score, b.relevance_score));

	existing
}

/// Descending comparison that sorts NaN last.
pub fn cmp_score_desc(a: f32, b: f32) -> Ordering {
	match (a.is_nan(), b.is_nan()) {
		(true, true) => Ordering::Equal,
		(true, false) => Ordering::Greater,
		(false, true) => Ordering::Less,
		(false, false) => b.partial_cmp(&a).unwrap_or(Ordering::Equal),
	}
}

/// Number of distinct books represented in `results`.
pub fn count_books(results: &[SearchResult]) -> usize {
	results.iter().map(|result| result.book_title.as_str()).collect::<HashSet<_>>().len()
}
