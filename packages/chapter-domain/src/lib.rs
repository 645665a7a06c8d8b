pub mod merge;
pub mod result;
pub mod snippet;
pub mod tier;
pub mod topics;

pub use merge::{cmp_score_desc, count_books, merge_results};
pub use result::{MAX_KEY_TOPICS, SearchResult, SearchType};
pub use tier::{Allowance, Capability, SearchTier, resolve_tier};
