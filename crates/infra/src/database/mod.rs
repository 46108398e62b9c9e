//! Database implementations

pub mod book_repository;
pub mod manager;
pub mod tag_repository;

pub use book_repository::BookRepository;
pub use manager::DbManager;
pub use tag_repository::TagRepository;
