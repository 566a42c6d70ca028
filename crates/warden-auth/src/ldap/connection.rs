//! Directory connection capability
//!
//! The provider never talks to a concrete LDAP client. It dials through a
//! [`ConnectionFactory`] and drives the returned [`DirectoryConnection`].
//! Implementations exist for a network directory (`ldap3`) and for an
//! in-memory directory.

use crate::ldap::types::{Entry, Modification, SearchRequest};
use async_trait::async_trait;
use warden_core::{DialOptions, DirectoryError};

pub type DirectoryResult<T> = std::result::Result<T, DirectoryError>;

/// Opens connections to a directory
#[async_trait]
pub trait ConnectionFactory: Send + Sync {
    async fn dial(
        &self,
        url: &str,
        options: &DialOptions,
    ) -> DirectoryResult<Box<dyn DirectoryConnection>>;
}

/// A single-use connection owned by the operation that dialed it.
///
/// Dropping a connection releases its transport; `close` does so politely
/// (unbind) and reports failures.
#[async_trait]
pub trait DirectoryConnection: Send {
    /// Upgrade the plaintext transport to TLS.
    async fn start_tls(&mut self) -> DirectoryResult<()>;

    /// Simple bind
    async fn bind(&mut self, dn: &str, password: &str) -> DirectoryResult<()>;

    async fn search(&mut self, request: SearchRequest) -> DirectoryResult<Vec<Entry>>;

    /// Apply replace modifications to the entry at `dn`.
    async fn modify(&mut self, dn: &str, changes: Vec<Modification>) -> DirectoryResult<()>;

    async fn close(&mut self) -> DirectoryResult<()>;
}
