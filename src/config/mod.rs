//! Profile Registry
//!
//! Persistent profile registry (the `~/.hostlink.json` document), the
//! operations layered on it, and secure credential storage via the system
//! keychain.

pub mod keychain;
pub mod model;
pub mod ops;
pub mod ssh_config;
pub mod store;

pub use keychain::{Keychain, KeychainError};
pub use model::{ConnectionProfile, ProfileDocument, ProfileKind, RdpProfile, SshProfile};
pub use ops::{EditRequest, ListFilter, ProfileRow};
pub use store::{ProfileStore, StoreError, DOCUMENT_FILE_NAME};
