#![forbid(unsafe_code)]

pub mod auth;
pub mod cache;
pub mod repository;
pub mod rest;
pub mod sqlite;

pub use auth::{AuthProvider, StaticAuth};
pub use cache::{CachedPreferences, FileCache, MemoryCache, PreferenceCache};
pub use repository::{Storage, StorageError};
