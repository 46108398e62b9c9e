//! Book records

use chrono::{DateTime, Datelike, Utc};
use serde::{Deserialize, Serialize};
#[cfg(feature = "ts-gen")]
use ts_rs::TS;

use super::tag::Tag;
use super::{require_text, utc};
use crate::constants::{
    DEFAULT_PAGE_SIZE, MAX_AUTHOR_LENGTH, MAX_NOTES_LENGTH, MAX_PAGE_SIZE, MAX_TITLE_LENGTH,
    MIN_PUBLISHED_YEAR,
};
use crate::errors::{DomainError, Result};
use crate::impl_domain_status_conversions;

/// Reading progress of a book.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "ts-gen", derive(TS))]
#[cfg_attr(feature = "ts-gen", ts(export))]
#[serde(rename_all = "lowercase")]
pub enum ReadingStatus {
    #[default]
    Unread,
    Reading,
    Finished,
    Abandoned,
}

impl_domain_status_conversions!(ReadingStatus {
    Unread => "unread",
    Reading => "reading",
    Finished => "finished",
    Abandoned => "abandoned",
});

/// A catalogued book with its tags.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts-gen", derive(TS))]
#[cfg_attr(feature = "ts-gen", ts(export))]
#[serde(rename_all = "camelCase")]
pub struct Book {
    #[cfg_attr(feature = "ts-gen", ts(type = "number"))]
    pub id: i64,
    pub title: String,
    pub author: String,
    pub isbn: Option<String>,
    pub published_year: Option<i32>,
    pub status: ReadingStatus,
    pub notes: Option<String>,
    pub tags: Vec<Tag>,
    #[cfg_attr(feature = "ts-gen", ts(type = "number"))]
    pub created_at: i64,
    #[cfg_attr(feature = "ts-gen", ts(type = "number"))]
    pub updated_at: i64,
}

impl Book {
    pub fn created_at_utc(&self) -> Option<DateTime<Utc>> {
        utc(self.created_at)
    }

    pub fn updated_at_utc(&self) -> Option<DateTime<Utc>> {
        utc(self.updated_at)
    }

    pub fn has_tag(&self, name: &str) -> bool {
        self.tags.iter().any(|t| t.name.eq_ignore_ascii_case(name))
    }
}

/// Input for creating a book.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts-gen", derive(TS))]
#[cfg_attr(feature = "ts-gen", ts(export))]
#[serde(rename_all = "camelCase", default)]
pub struct NewBook {
    pub title: String,
    pub author: String,
    pub isbn: Option<String>,
    pub published_year: Option<i32>,
    pub status: ReadingStatus,
    pub notes: Option<String>,
    /// Tag names; missing tags are created
    pub tags: Vec<String>,
}

impl NewBook {
    pub fn new(title: impl Into<String>, author: impl Into<String>) -> Self {
        Self { title: title.into(), author: author.into(), ..Self::default() }
    }

    #[must_use]
    pub fn with_isbn(mut self, isbn: impl Into<String>) -> Self {
        self.isbn = Some(isbn.into());
        self
    }

    #[must_use]
    pub fn with_year(mut self, year: i32) -> Self {
        self.published_year = Some(year);
        self
    }

    #[must_use]
    pub fn with_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags = tags.into_iter().map(Into::into).collect();
        self
    }

    pub fn validate(&self) -> Result<()> {
        require_text("title", &self.title, MAX_TITLE_LENGTH)?;
        require_text("author", &self.author, MAX_AUTHOR_LENGTH)?;
        validate_optional_fields(self.isbn.as_deref(), self.published_year, self.notes.as_deref())
    }

    /// ISBN with spaces and hyphens removed.
    pub fn normalized_isbn(&self) -> Option<String> {
        self.isbn.as_deref().map(normalize_isbn)
    }
}

/// Partial update; `None` leaves a field unchanged.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts-gen", derive(TS))]
#[cfg_attr(feature = "ts-gen", ts(export))]
#[serde(rename_all = "camelCase", default)]
pub struct BookUpdate {
    pub title: Option<String>,
    pub author: Option<String>,
    pub isbn: Option<String>,
    pub published_year: Option<i32>,
    pub status: Option<ReadingStatus>,
    pub notes: Option<String>,
    /// Replaces the full tag set when present
    pub tags: Option<Vec<String>>,
}

impl BookUpdate {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    pub fn validate(&self) -> Result<()> {
        if let Some(title) = &self.title {
            require_text("title", title, MAX_TITLE_LENGTH)?;
        }
        if let Some(author) = &self.author {
            require_text("author", author, MAX_AUTHOR_LENGTH)?;
        }
        validate_optional_fields(self.isbn.as_deref(), self.published_year, self.notes.as_deref())
    }
}

/// Listing filter.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct BookFilter {
    /// Matches title or author, case-insensitive
    pub search: Option<String>,
    pub tag: Option<String>,
    pub status: Option<ReadingStatus>,
    pub limit: Option<u32>,
    pub offset: Option<u32>,
}

impl BookFilter {
    /// Requested page size clamped to `1..=MAX_PAGE_SIZE`.
    pub fn page_size(&self) -> u32 {
        self.limit.unwrap_or(DEFAULT_PAGE_SIZE).clamp(1, MAX_PAGE_SIZE)
    }

    pub fn offset(&self) -> u32 {
        self.offset.unwrap_or(0)
    }
}

fn validate_optional_fields(isbn: Option<&str>, year: Option<i32>, notes: Option<&str>) -> Result<()> {
    if let Some(isbn) = isbn {
        validate_isbn(isbn)?;
    }
    if let Some(year) = year {
        let max_year = Utc::now().year() + 1;
        if !(MIN_PUBLISHED_YEAR..=max_year).contains(&year) {
            return Err(DomainError::invalid(
                "publishedYear",
                format!("{year} is outside {MIN_PUBLISHED_YEAR}..={max_year}"),
            ));
        }
    }
    if notes.is_some_and(|n| n.chars().count() > MAX_NOTES_LENGTH) {
        return Err(DomainError::too_long("notes", MAX_NOTES_LENGTH));
    }
    Ok(())
}

/// ISBN with spaces and hyphens removed, check letter upper-cased.
pub fn normalize_isbn(raw: &str) -> String {
    raw.chars().filter(|c| !matches!(c, '-' | ' ')).collect::<String>().to_uppercase()
}

/// ISBN-10 (last digit may be `X`) or ISBN-13, checksum not verified.
fn validate_isbn(raw: &str) -> Result<()> {
    let isbn = normalize_isbn(raw);
    let valid = match isbn.chars().count() {
        10 => {
            isbn.chars().take(9).all(|c| c.is_ascii_digit())
                && isbn.chars().last().is_some_and(|c| c.is_ascii_digit() || c == 'X')
        }
        13 => isbn.chars().all(|c| c.is_ascii_digit()),
        _ => false,
    };
    if valid {
        Ok(())
    } else {
        Err(DomainError::invalid("isbn", format!("'{raw}' is not an ISBN-10 or ISBN-13")))
    }
}
