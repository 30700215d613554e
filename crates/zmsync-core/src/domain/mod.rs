//! Domain entities and business logic
//!
//! This module contains the core domain types for zmsync:
//! - Event directories and the date codec that reads their paths
//! - Date ranges used to select events
//! - Archive files and MD5 checksums
//! - The remote manifest and the upload plan computed from it
//! - Domain-specific error types

pub mod archive;
pub mod codec;
pub mod errors;
pub mod event;
pub mod plan;

// Re-export commonly used types
pub use archive::{archive_file_name, ArchiveFile, Checksum, ARCHIVE_EXTENSION, ARCHIVE_MIME_TYPE};
pub use codec::DirectoryDateCodec;
pub use errors::DomainError;
pub use event::{DateRange, EventDirectory};
pub use plan::{RemoteManifestEntry, SyncPlan};
