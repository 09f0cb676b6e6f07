//! Storage backends for the Shortly URL shortener.
//!
//! Three interchangeable implementations of [`shortly_core::Storage`]:
//! an in-process map ([`MemoryStorage`]), a JSON snapshot file
//! ([`FileStorage`]) and a PostgreSQL table ([`PostgresStorage`]).

mod index;

pub mod file;
pub mod memory;
pub mod postgres;

pub use file::FileStorage;
pub use memory::MemoryStorage;
pub use postgres::PostgresStorage;
pub use shortly_core::{Storage, StorageError};
