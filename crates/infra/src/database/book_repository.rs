//! Book persistence.
//!
//! Reads go through [`DbManager::with_connection`] (retried, timed, counted in
//! the metrics window); writes through [`DbManager::with_transaction`].

use std::str::FromStr;
use std::sync::Arc;

use catalog_common::{CatalogError, CatalogResult, RunOptions, StorageError, StorageResult};
use catalog_domain::{
    normalize_isbn, Book, BookFilter, BookUpdate, NewBook, NewTag, ReadingStatus, Tag,
};
use chrono::Utc;
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Row};
use tracing::{debug, instrument};

use super::manager::DbManager;
use super::tag_repository::fetch_tags_for_book;
use crate::errors::IntoCatalogError;

const BOOK_COLUMNS: &str =
    "b.id, b.title, b.author, b.isbn, b.published_year, b.status, b.notes, b.created_at, b.updated_at";

/// Book repository backed by the catalog database.
#[derive(Debug, Clone)]
pub struct BookRepository {
    db: Arc<DbManager>,
}

impl BookRepository {
    pub fn new(db: Arc<DbManager>) -> Self {
        Self { db }
    }

    /// Insert a book, creating any tags it names that do not exist yet.
    ///
    /// # Errors
    /// `VALIDATION_ERROR` for invalid input, `CONFLICT` for a duplicate ISBN.
    #[instrument(skip_all, fields(request_id = options.request_id.as_deref()))]
    pub async fn create(&self, input: NewBook, options: RunOptions) -> CatalogResult<Book> {
        validate_new_book(&input)?;

        let book = self
            .db
            .with_transaction(options, move |tx| {
                let now = Utc::now().timestamp();
                tx.execute(
                    "INSERT INTO books (title, author, isbn, published_year, status, notes, created_at, updated_at)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?7)",
                    params![
                        input.title.trim(),
                        input.author.trim(),
                        input.normalized_isbn(),
                        input.published_year,
                        input.status.to_string(),
                        input.notes,
                        now,
                    ],
                )?;
                let id = tx.last_insert_rowid();
                link_tags(tx, id, &input.tags, now)?;

                fetch_book(tx, id)?
                    .ok_or_else(|| StorageError::Query(format!("book {id} missing after insert")))
            })
            .await?;

        debug!(book_id = book.id, "book created");
        Ok(book)
    }

    /// # Errors
    /// `BOOK_NOT_FOUND` when no book has `id`.
    pub async fn get(&self, id: i64, options: RunOptions) -> CatalogResult<Book> {
        let request_id = options.request_id.clone();

        self.db
            .with_connection("get_book", "books", options, move |conn| fetch_book(conn, id))
            .await?
            .ok_or_else(|| CatalogError::book_not_found(id).with_request_id(request_id))
    }

    /// Page of books matching `filter`, most recently updated first.
    pub async fn list(&self, filter: BookFilter, options: RunOptions) -> CatalogResult<Vec<Book>> {
        self.db
            .with_connection("list_books", "books", options, move |conn| query_books(conn, &filter))
            .await
    }

    /// Apply a partial update. A present `tags` list replaces the tag set.
    ///
    /// # Errors
    /// `BAD_REQUEST` for an empty update, `VALIDATION_ERROR` for invalid
    /// values, `BOOK_NOT_FOUND` when no book has `id`.
    #[instrument(skip_all, fields(book_id = id, request_id = options.request_id.as_deref()))]
    pub async fn update(&self, id: i64, changes: BookUpdate, options: RunOptions) -> CatalogResult<Book> {
        if changes.is_empty() {
            return Err(CatalogError::bad_request("Update contains no fields")
                .with_request_id(options.request_id));
        }
        changes.validate().map_err(IntoCatalogError::into_catalog)?;
        if let Some(tags) = &changes.tags {
            validate_tag_names(tags)?;
        }

        let request_id = options.request_id.clone();
        self.db
            .with_transaction(options, move |tx| {
                let now = Utc::now().timestamp();
                let (set_clause, mut values) = update_assignments(&changes, now);
                values.push(Value::Integer(id));

                let sql = format!("UPDATE books SET {set_clause} WHERE id = ?");
                if tx.execute(&sql, params_from_iter(values.iter()))? == 0 {
                    return Ok(None);
                }

                if let Some(tags) = &changes.tags {
                    tx.execute("DELETE FROM book_tags WHERE book_id = ?1", params![id])?;
                    link_tags(tx, id, tags, now)?;
                }

                fetch_book(tx, id)
            })
            .await?
            .ok_or_else(|| CatalogError::book_not_found(id).with_request_id(request_id))
    }

    /// # Errors
    /// `BOOK_NOT_FOUND` when no book has `id`.
    #[instrument(skip_all, fields(book_id = id, request_id = options.request_id.as_deref()))]
    pub async fn delete(&self, id: i64, options: RunOptions) -> CatalogResult<()> {
        let request_id = options.request_id.clone();

        let removed = self
            .db
            .with_transaction(options, move |tx| {
                Ok(tx.execute("DELETE FROM books WHERE id = ?1", params![id])?)
            })
            .await?;

        if removed == 0 {
            return Err(CatalogError::book_not_found(id).with_request_id(request_id));
        }
        Ok(())
    }

    pub async fn count(&self, options: RunOptions) -> CatalogResult<u64> {
        self.db
            .with_connection("count_books", "books", options, |conn| {
                let count: i64 = conn.query_row("SELECT COUNT(*) FROM books", [], |row| row.get(0))?;
                Ok(u64::try_from(count).unwrap_or_default())
            })
            .await
    }
}

fn validate_new_book(input: &NewBook) -> CatalogResult<()> {
    input.validate().map_err(IntoCatalogError::into_catalog)?;
    validate_tag_names(&input.tags)
}

fn validate_tag_names(names: &[String]) -> CatalogResult<()> {
    names
        .iter()
        .try_for_each(|name| NewTag::new(name.as_str()).validate())
        .map_err(IntoCatalogError::into_catalog)
}

/// `SET` clause and its bound values; `updated_at` is always refreshed.
fn update_assignments(changes: &BookUpdate, now: i64) -> (String, Vec<Value>) {
    let mut columns = Vec::new();
    let mut values = Vec::new();

    if let Some(title) = &changes.title {
        columns.push("title = ?");
        values.push(Value::Text(title.trim().to_string()));
    }
    if let Some(author) = &changes.author {
        columns.push("author = ?");
        values.push(Value::Text(author.trim().to_string()));
    }
    if let Some(isbn) = &changes.isbn {
        columns.push("isbn = ?");
        values.push(Value::Text(normalize_isbn(isbn)));
    }
    if let Some(year) = changes.published_year {
        columns.push("published_year = ?");
        values.push(Value::Integer(i64::from(year)));
    }
    if let Some(status) = changes.status {
        columns.push("status = ?");
        values.push(Value::Text(status.to_string()));
    }
    if let Some(notes) = &changes.notes {
        columns.push("notes = ?");
        values.push(Value::Text(notes.clone()));
    }
    columns.push("updated_at = ?");
    values.push(Value::Integer(now));

    (columns.join(", "), values)
}

/// Attach tags by name, creating missing ones. Names compare
/// case-insensitively.
fn link_tags(conn: &Connection, book_id: i64, names: &[String], now: i64) -> StorageResult<()> {
    for name in names.iter().map(|n| n.trim()).filter(|n| !n.is_empty()) {
        conn.execute(
            "INSERT INTO tags (name, created_at) VALUES (?1, ?2) ON CONFLICT(name) DO NOTHING",
            params![name, now],
        )?;
        let tag_id: i64 =
            conn.query_row("SELECT id FROM tags WHERE name = ?1", params![name], |row| row.get(0))?;
        conn.execute(
            "INSERT OR IGNORE INTO book_tags (book_id, tag_id) VALUES (?1, ?2)",
            params![book_id, tag_id],
        )?;
    }
    Ok(())
}

pub(crate) fn fetch_book(conn: &Connection, id: i64) -> StorageResult<Option<Book>> {
    let sql = format!("SELECT {BOOK_COLUMNS} FROM books b WHERE b.id = ?1");
    let Some(row) = conn.query_row(&sql, params![id], BookRow::from_row).optional()? else {
        return Ok(None);
    };

    let tags = fetch_tags_for_book(conn, id)?;
    row.into_book(tags).map(Some)
}

fn query_books(conn: &Connection, filter: &BookFilter) -> StorageResult<Vec<Book>> {
    let mut sql = format!("SELECT {BOOK_COLUMNS} FROM books b WHERE 1 = 1");
    let mut values: Vec<Value> = Vec::new();

    if let Some(search) = filter.search.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
        sql.push_str(" AND (b.title LIKE ? ESCAPE '\\' OR b.author LIKE ? ESCAPE '\\')");
        let pattern = format!("%{}%", escape_like(search));
        values.push(Value::Text(pattern.clone()));
        values.push(Value::Text(pattern));
    }
    if let Some(tag) = filter.tag.as_deref().map(str::trim).filter(|t| !t.is_empty()) {
        sql.push_str(
            " AND EXISTS (SELECT 1 FROM book_tags bt JOIN tags t ON t.id = bt.tag_id
                          WHERE bt.book_id = b.id AND t.name = ?)",
        );
        values.push(Value::Text(tag.to_string()));
    }
    if let Some(status) = filter.status {
        sql.push_str(" AND b.status = ?");
        values.push(Value::Text(status.to_string()));
    }

    sql.push_str(" ORDER BY b.updated_at DESC, b.id DESC LIMIT ? OFFSET ?");
    values.push(Value::Integer(i64::from(filter.page_size())));
    values.push(Value::Integer(i64::from(filter.offset())));

    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map(params_from_iter(values.iter()), BookRow::from_row)?
        .collect::<Result<Vec<_>, _>>()?;

    rows.into_iter()
        .map(|row| {
            let tags = fetch_tags_for_book(conn, row.id)?;
            row.into_book(tags)
        })
        .collect()
}

fn escape_like(raw: &str) -> String {
    raw.replace('\\', "\\\\").replace('%', "\\%").replace('_', "\\_")
}

/// Column values before the status text is parsed.
struct BookRow {
    id: i64,
    title: String,
    author: String,
    isbn: Option<String>,
    published_year: Option<i32>,
    status: String,
    notes: Option<String>,
    created_at: i64,
    updated_at: i64,
}

impl BookRow {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            title: row.get(1)?,
            author: row.get(2)?,
            isbn: row.get(3)?,
            published_year: row.get(4)?,
            status: row.get(5)?,
            notes: row.get(6)?,
            created_at: row.get(7)?,
            updated_at: row.get(8)?,
        })
    }

    fn into_book(self, tags: Vec<Tag>) -> StorageResult<Book> {
        let status = ReadingStatus::from_str(&self.status).map_err(StorageError::Query)?;
        Ok(Book {
            id: self.id,
            title: self.title,
            author: self.author,
            isbn: self.isbn,
            published_year: self.published_year,
            status,
            notes: self.notes,
            tags,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}
