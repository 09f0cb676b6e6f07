//! URL shortener service implementation.
//!
//! [`ShortenerService`] implements the [`Shortener`](shortly_core::Shortener)
//! capability set on top of any [`Storage`](shortly_core::Storage) backend.
//! [`open_storage`] picks the backend from [`StorageOptions`].

pub mod auth;
pub mod chunk;
pub mod config;
pub mod deadline;
pub mod factory;
pub mod service;
pub mod user_id;

pub use auth::JwtCredentials;
pub use config::ShortenerConfig;
pub use deadline::with_deadline;
pub use factory::{open_storage, BackendKind, StorageOptions};
pub use service::ShortenerService;
pub use user_id::UserIdAllocator;
