//! logkeeper - live log tailing, search and bookmarks.

pub mod archive;
pub mod bookmarks;
pub mod config;
pub mod display;
pub mod matcher;
pub mod session;
pub mod tail;
