//! Tag records

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
#[cfg(feature = "ts-gen")]
use ts_rs::TS;

use super::{require_text, utc};
use crate::constants::MAX_TAG_NAME_LENGTH;
use crate::errors::{DomainError, Result};

/// Label attached to books.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts-gen", derive(TS))]
#[cfg_attr(feature = "ts-gen", ts(export))]
#[serde(rename_all = "camelCase")]
pub struct Tag {
    #[cfg_attr(feature = "ts-gen", ts(type = "number"))]
    pub id: i64,
    pub name: String,
    /// `#rrggbb`
    pub color: Option<String>,
    #[cfg_attr(feature = "ts-gen", ts(type = "number"))]
    pub created_at: i64,
}

impl Tag {
    pub fn created_at_utc(&self) -> Option<DateTime<Utc>> {
        utc(self.created_at)
    }
}

/// Input for creating or renaming a tag.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts-gen", derive(TS))]
#[cfg_attr(feature = "ts-gen", ts(export))]
pub struct NewTag {
    pub name: String,
    pub color: Option<String>,
}

impl NewTag {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into(), color: None }
    }

    #[must_use]
    pub fn with_color(mut self, color: impl Into<String>) -> Self {
        self.color = Some(color.into());
        self
    }

    pub fn validate(&self) -> Result<()> {
        require_text("name", &self.name, MAX_TAG_NAME_LENGTH)?;
        if let Some(color) = &self.color {
            if !is_hex_color(color) {
                return Err(DomainError::invalid("color", format!("'{color}' is not #rrggbb")));
            }
        }
        Ok(())
    }

    /// Trimmed, lower-cased name; tags compare case-insensitively.
    pub fn normalized_name(&self) -> String {
        self.name.trim().to_lowercase()
    }
}

fn is_hex_color(value: &str) -> bool {
    value.len() == 7
        && value.starts_with('#')
        && value[1..].chars().all(|c| c.is_ascii_hexdigit())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_name() {
        assert!(NewTag::new("fiction").validate().is_ok());
        assert_eq!(NewTag::new("   ").validate(), Err(DomainError::empty("name")));
        assert_eq!(
            NewTag::new("x".repeat(51)).validate(),
            Err(DomainError::too_long("name", MAX_TAG_NAME_LENGTH))
        );
    }

    #[test]
    fn test_validate_color() {
        assert!(NewTag::new("a").with_color("#1a2B3c").validate().is_ok());
        assert!(NewTag::new("a").with_color("red").validate().is_err());
        assert!(NewTag::new("a").with_color("#12345g").validate().is_err());
    }

    #[test]
    fn test_normalized_name() {
        assert_eq!(NewTag::new("  Sci-Fi ").normalized_name(), "sci-fi");
    }
}
