use sqlx::PgPool;
use uuid::Uuid;

use crate::{
	Error, Result,
	models::{ChapterRow, NewBook, NewChapter, RankedMatch, VectorMatch},
};

const CHAPTER_COLUMNS: &str = "\
	c.chapter_id,
	b.title AS book_title,
	c.title AS chapter_title,
	c.summary,
	c.content";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VectorColumn {
	Summary,
	Content,
}
impl VectorColumn {
	fn column(self) -> &'static str {
		match self {
			Self::Summary => "summary_embedding",
			Self::Content => "content_embedding",
		}
	}
}

/// Which text a substring lookup scans.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubstringField {
	ChapterTitle,
	/// Chapter content and summary.
	Body,
	BookTitle,
}
impl SubstringField {
	pub const ALL: [Self; 3] = [Self::ChapterTitle, Self::Body, Self::BookTitle];

	pub fn as_str(self) -> &'static str {
		match self {
			Self::ChapterTitle => "chapter_title",
			Self::Body => "body",
			Self::BookTitle => "book_title",
		}
	}

	fn predicate(self) -> &'static str {
		match self {
			Self::ChapterTitle => "c.title ILIKE $1 ESCAPE '\\'",
			Self::Body => "(c.content ILIKE $1 ESCAPE '\\' OR c.summary ILIKE $1 ESCAPE '\\')",
			Self::BookTitle => "b.title ILIKE $1 ESCAPE '\\'",
		}
	}
}

pub struct NearestArgs<'a> {
	pub column: VectorColumn,
	pub vector: &'a [f32],
	/// Cosine distance cut-off, `1 - min_similarity`.
	pub max_distance: f32,
	pub limit: u32,
	/// Restricts candidates to these chapter ids when present.
	pub scope: Option<&'a [Uuid]>,
}

pub async fn nearest_chapters(pool: &PgPool, args: NearestArgs<'_>) -> Result<Vec<VectorMatch>> {
	let NearestArgs { column, vector, max_distance, limit, scope } = args;

	if vector.is_empty() {
		return Err(Error::InvalidArgument("Query vector must be non-empty.".to_string()));
	}

	let column = column.column();
	let sql = format!(
		"\
SELECT
	{CHAPTER_COLUMNS},
	(c.{column} <=> $1::text::vector)::real AS distance
FROM chapters c
JOIN books b ON b.book_id = c.book_id
WHERE c.{column} IS NOT NULL
	AND (c.{column} <=> $1::text::vector) <= $2
	AND ($4::uuid[] IS NULL OR c.chapter_id = ANY($4))
ORDER BY distance ASC, c.chapter_id ASC
LIMIT $3"
	);
	let rows = sqlx::query_as::<_, VectorMatch>(&sql)
		.bind(vector_to_pg(vector))
		.bind(f64::from(max_distance))
		.bind(i64::from(limit))
		.bind(scope.map(<[Uuid]>::to_vec))
		.fetch_all(pool)
		.await?;

	Ok(rows)
}

pub async fn fulltext_chapters(pool: &PgPool, query: &str, limit: u32) -> Result<Vec<RankedMatch>> {
	let sql = format!(
		"\
SELECT
	{CHAPTER_COLUMNS},
	ts_rank(c.search_tsv, plainto_tsquery('english', $1))::real AS rank
FROM chapters c
JOIN books b ON b.book_id = c.book_id
WHERE c.search_tsv @@ plainto_tsquery('english', $1)
ORDER BY rank DESC, c.chapter_id ASC
LIMIT $2"
	);
	let rows = sqlx::query_as::<_, RankedMatch>(&sql)
		.bind(query)
		.bind(i64::from(limit))
		.fetch_all(pool)
		.await?;

	Ok(rows)
}

pub async fn substring_chapters(
	pool: &PgPool,
	field: SubstringField,
	query: &str,
	limit: u32,
) -> Result<Vec<ChapterRow>> {
	let predicate = field.predicate();
	let sql = format!(
		"\
SELECT
	{CHAPTER_COLUMNS}
FROM chapters c
JOIN books b ON b.book_id = c.book_id
WHERE {predicate}
ORDER BY b.title ASC, c.chapter_number ASC
LIMIT $2"
	);
	let rows = sqlx::query_as::<_, ChapterRow>(&sql)
		.bind(like_pattern(query))
		.bind(i64::from(limit))
		.fetch_all(pool)
		.await?;

	Ok(rows)
}

pub async fn insert_book(pool: &PgPool, book: &NewBook) -> Result<()> {
	sqlx::query(
		"\
INSERT INTO books (book_id, title, author)
VALUES ($1, $2, $3)
ON CONFLICT (book_id) DO UPDATE SET title = EXCLUDED.title, author = EXCLUDED.author",
	)
	.bind(book.book_id)
	.bind(book.title.as_str())
	.bind(book.author.as_deref())
	.execute(pool)
	.await?;

	Ok(())
}

pub async fn insert_chapter(pool: &PgPool, chapter: &NewChapter) -> Result<()> {
	sqlx::query(
		"\
INSERT INTO chapters (
	chapter_id,
	book_id,
	chapter_number,
	title,
	summary,
	content,
	summary_embedding,
	content_embedding
)
VALUES ($1, $2, $3, $4, $5, $6, $7::text::vector, $8::text::vector)
ON CONFLICT (chapter_id) DO UPDATE SET
	title = EXCLUDED.title,
	summary = EXCLUDED.summary,
	content = EXCLUDED.content,
	summary_embedding = EXCLUDED.summary_embedding,
	content_embedding = EXCLUDED.content_embedding",
	)
	.bind(chapter.chapter_id)
	.bind(chapter.book_id)
	.bind(chapter.chapter_number)
	.bind(chapter.title.as_str())
	.bind(chapter.summary.as_deref())
	.bind(chapter.content.as_deref())
	.bind(chapter.summary_embedding.as_deref().map(vector_to_pg))
	.bind(chapter.content_embedding.as_deref().map(vector_to_pg))
	.execute(pool)
	.await?;

	Ok(())
}

pub fn vector_to_pg(vec: &[f32]) -> String {
	let mut out = String::with_capacity(vec.len() * 8);

	out.push('[');

	for (i, value) in vec.iter().enumerate() {
		if i > 0 {
			out.push(',');
		}

		out.push_str(&value.to_string());
	}

	out.push(']');

	out
}

/// Wraps `query` in `%` wildcards after escaping LIKE metacharacters.
pub fn like_pattern(query: &str) -> String {
	let mut out = String::with_capacity(query.len() + 2);

	out.push('%');

	for ch in query.trim().chars() {
		if matches!(ch, '\\' | '%' | '_') {
			out.push('\\');
		}

		out.push(ch);
	}

	out.push('%');

	out
}
