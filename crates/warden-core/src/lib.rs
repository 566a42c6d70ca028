//! Warden Core Library
//!
//! Configuration, error taxonomy and diagnostics shared by the Warden crates.

pub mod config;
pub mod diagnostics;
pub mod error;

pub use config::{
    DialOptions, Implementation, LdapConfig, NormalizedLdapConfig, TlsOptions, TlsVersion,
    WardenConfig,
};
pub use diagnostics::{Diagnostics, TracingDiagnostics};
pub use error::{DirectoryError, Error, ErrorKind, Operation, Result};

/// Warden version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Default directory connection timeout in seconds
pub const DEFAULT_LDAP_TIMEOUT_SECS: u64 = 5;

/// Characters escaped with a backslash in user input, on top of RFC 4515 escaping
pub const DEFAULT_SPECIAL_CHARACTERS: &str = ",#+<>;\"=";
