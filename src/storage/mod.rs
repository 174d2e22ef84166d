//! Storage Module
//!
//! The service directory: a flat set of files, no metadata beyond name and
//! content.
//!
//! ## Responsibilities
//! - Enumerate, read and write files in one directory
//! - Confine every operation to that directory
//! - Never mutate process-wide state (no working-directory changes)

mod file_service;

pub use file_service::FileService;
