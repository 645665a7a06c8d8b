use time::OffsetDateTime;
use uuid::Uuid;

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct ChapterRow {
	pub chapter_id: Uuid,
	pub book_title: String,
	pub chapter_title: String,
	pub summary: Option<String>,
	pub content: Option<String>,
}

/// A chapter found by cosine distance against one of the embedding columns.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct VectorMatch {
	#[sqlx(flatten)]
	pub chapter: ChapterRow,
	pub distance: f32,
}

/// A chapter found by the full-text index, scored with `ts_rank`.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct RankedMatch {
	#[sqlx(flatten)]
	pub chapter: ChapterRow,
	pub rank: f32,
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct Account {
	pub account_id: Uuid,
	pub plan: String,
	pub queries_used: i32,
	pub updated_at: OffsetDateTime,
}

#[derive(Debug)]
pub struct NewBook {
	pub book_id: Uuid,
	pub title: String,
	pub author: Option<String>,
}

#[derive(Debug)]
pub struct NewChapter {
	pub chapter_id: Uuid,
	pub book_id: Uuid,
	pub chapter_number: i32,
	pub title: String,
	pub summary: Option<String>,
	pub content: Option<String>,
	pub summary_embedding: Option<Vec<f32>>,
	pub content_embedding: Option<Vec<f32>>,
}
