//! Core types and traits for the Shortly URL shortener.
//!
//! This crate provides the storage contract implemented by every backend and
//! the capability contract exposed by the shortener service.

pub mod error;
pub mod shortcode;
pub mod shortener;
pub mod storage;

pub use error::{ShortenerError, StorageError};
pub use shortcode::ShortCode;
pub use shortener::{BatchResult, BatchUrl, Encoded, Shortener};
pub use storage::{Storage, UrlCodePair, UrlLookup, UserId, UserUrl};
