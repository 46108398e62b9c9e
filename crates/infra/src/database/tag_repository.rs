//! Tag persistence.

use std::sync::Arc;

use catalog_common::{CatalogError, CatalogResult, RunOptions, StorageResult};
use catalog_domain::{NewTag, Tag};
use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension, Row};
use tracing::{debug, instrument};

use super::manager::DbManager;
use crate::errors::IntoCatalogError;

const TAG_COLUMNS: &str = "t.id, t.name, t.color, t.created_at";

/// Tag repository backed by the catalog database.
#[derive(Debug, Clone)]
pub struct TagRepository {
    db: Arc<DbManager>,
}

impl TagRepository {
    pub fn new(db: Arc<DbManager>) -> Self {
        Self { db }
    }

    /// # Errors
    /// `VALIDATION_ERROR` for invalid input, `CONFLICT` when a tag with the
    /// same name (ignoring case) exists.
    #[instrument(skip_all, fields(request_id = options.request_id.as_deref()))]
    pub async fn create(&self, input: NewTag, options: RunOptions) -> CatalogResult<Tag> {
        input.validate().map_err(IntoCatalogError::into_catalog)?;

        let tag = self
            .db
            .with_transaction(options, move |tx| {
                tx.execute(
                    "INSERT INTO tags (name, color, created_at) VALUES (?1, ?2, ?3)",
                    params![input.name.trim(), input.color, Utc::now().timestamp()],
                )?;
                let id = tx.last_insert_rowid();
                Ok(tx.query_row(&select_by_id(), params![id], tag_from_row)?)
            })
            .await?;

        debug!(tag_id = tag.id, "tag created");
        Ok(tag)
    }

    /// # Errors
    /// `TAG_NOT_FOUND` when no tag has `id`.
    pub async fn get(&self, id: i64, options: RunOptions) -> CatalogResult<Tag> {
        let request_id = options.request_id.clone();

        self.db
            .with_connection("get_tag", "tags", options, move |conn| fetch_tag(conn, id))
            .await?
            .ok_or_else(|| CatalogError::tag_not_found(id).with_request_id(request_id))
    }

    /// Case-insensitive lookup.
    pub async fn find_by_name(&self, name: &str, options: RunOptions) -> CatalogResult<Option<Tag>> {
        let name = name.trim().to_string();

        self.db
            .with_connection("find_tag_by_name", "tags", options, move |conn| {
                let sql = format!("SELECT {TAG_COLUMNS} FROM tags t WHERE t.name = ?1");
                Ok(conn.query_row(&sql, params![name], tag_from_row).optional()?)
            })
            .await
    }

    /// All tags ordered by name.
    pub async fn list(&self, options: RunOptions) -> CatalogResult<Vec<Tag>> {
        self.db
            .with_connection("list_tags", "tags", options, |conn| {
                let sql = format!("SELECT {TAG_COLUMNS} FROM tags t ORDER BY t.name COLLATE NOCASE");
                let mut stmt = conn.prepare(&sql)?;
                let tags = stmt.query_map([], tag_from_row)?.collect::<Result<Vec<_>, _>>()?;
                Ok(tags)
            })
            .await
    }

    /// Replace a tag's name and color.
    ///
    /// # Errors
    /// `TAG_NOT_FOUND` when no tag has `id`, `CONFLICT` when the new name is
    /// taken.
    #[instrument(skip_all, fields(tag_id = id, request_id = options.request_id.as_deref()))]
    pub async fn rename(&self, id: i64, input: NewTag, options: RunOptions) -> CatalogResult<Tag> {
        input.validate().map_err(IntoCatalogError::into_catalog)?;
        let request_id = options.request_id.clone();

        self.db
            .with_transaction(options, move |tx| {
                let changed = tx.execute(
                    "UPDATE tags SET name = ?1, color = ?2 WHERE id = ?3",
                    params![input.name.trim(), input.color, id],
                )?;
                if changed == 0 {
                    return Ok(None);
                }
                fetch_tag(tx, id)
            })
            .await?
            .ok_or_else(|| CatalogError::tag_not_found(id).with_request_id(request_id))
    }

    /// # Errors
    /// `TAG_NOT_FOUND` when no tag has `id`, `VALIDATION_ERROR` while books
    /// still carry the tag.
    #[instrument(skip_all, fields(tag_id = id, request_id = options.request_id.as_deref()))]
    pub async fn delete(&self, id: i64, options: RunOptions) -> CatalogResult<()> {
        let request_id = options.request_id.clone();

        let removed = self
            .db
            .with_transaction(options, move |tx| {
                Ok(tx.execute("DELETE FROM tags WHERE id = ?1", params![id])?)
            })
            .await?;

        if removed == 0 {
            return Err(CatalogError::tag_not_found(id).with_request_id(request_id));
        }
        Ok(())
    }
}

fn select_by_id() -> String {
    format!("SELECT {TAG_COLUMNS} FROM tags t WHERE t.id = ?1")
}

fn fetch_tag(conn: &Connection, id: i64) -> StorageResult<Option<Tag>> {
    Ok(conn.query_row(&select_by_id(), params![id], tag_from_row).optional()?)
}

/// Tags attached to a book, ordered by name.
pub(crate) fn fetch_tags_for_book(conn: &Connection, book_id: i64) -> StorageResult<Vec<Tag>> {
    let sql = format!(
        "SELECT {TAG_COLUMNS} FROM tags t
         JOIN book_tags bt ON bt.tag_id = t.id
         WHERE bt.book_id = ?1
         ORDER BY t.name COLLATE NOCASE"
    );
    let mut stmt = conn.prepare_cached(&sql)?;
    let tags = stmt.query_map(params![book_id], tag_from_row)?.collect::<Result<Vec<_>, _>>()?;
    Ok(tags)
}

fn tag_from_row(row: &Row<'_>) -> rusqlite::Result<Tag> {
    Ok(Tag { id: row.get(0)?, name: row.get(1)?, color: row.get(2)?, created_at: row.get(3)? })
}
