//! Integration tests for zmsync-drive
//!
//! Uses wiremock to simulate the Drive v3 API and Google's token endpoint,
//! and verifies folder handling, paginated listings, uploads, and the
//! cache/refresh/prompt authentication sequence.

mod common;

mod test_auth;
mod test_directories;
mod test_listing;
mod test_upload;
