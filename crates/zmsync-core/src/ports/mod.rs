//! Port definitions (hexagonal architecture interfaces)
//!
//! This module defines the port traits that form the boundaries of the
//! hexagonal architecture. Ports are interfaces that the sync orchestrator
//! depends on, but whose implementations live in adapter crates.
//!
//! ## Ports Overview
//!
//! - [`IRemoteStore`] - Cloud storage operations (Google Drive)
//! - [`IArchiveProducer`] - Compressing event directories into archives
//! - [`IStatusReporter`] - User-facing status lines

pub mod archiver;
pub mod remote_store;
pub mod status;

pub use archiver::IArchiveProducer;
pub use remote_store::{
    Credential, DirectoryHandle, ErrorClass, FileHandle, IRemoteStore, CREDENTIAL_FILE_NAME,
};
pub use status::{CollectingStatusReporter, IStatusReporter, NullStatusReporter, StatusKind};
