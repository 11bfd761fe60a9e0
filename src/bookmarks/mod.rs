//! Durable bookmarks of files the user cares about.

mod error;
mod store;

pub use error::BookmarkError;
pub use store::{BookmarkStore, BOOKMARKS_FILE};
