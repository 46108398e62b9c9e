//! Field limits enforced before records reach storage.

pub const MAX_TITLE_LENGTH: usize = 500;
pub const MAX_AUTHOR_LENGTH: usize = 200;
pub const MAX_TAG_NAME_LENGTH: usize = 50;
pub const MAX_NOTES_LENGTH: usize = 10_000;

/// Earliest accepted publication year.
pub const MIN_PUBLISHED_YEAR: i32 = 1000;

/// Page size used when a listing does not specify one.
pub const DEFAULT_PAGE_SIZE: u32 = 50;
pub const MAX_PAGE_SIZE: u32 = 500;
