//! LDAP/Active Directory user provider
//!
//! Works against:
//! - LDAP (OpenLDAP, 389 Directory Server)
//! - Microsoft Active Directory
//!
//! Features:
//! - Credential validation with a dedicated user bind
//! - Profile and group membership lookup
//! - Password updates (`userPassword` or `unicodePwd`)
//! - TLS/STARTTLS support

mod connection;
mod filter;
pub mod memory;
mod network;
mod password;
mod provider;
mod types;

pub use connection::{ConnectionFactory, DirectoryConnection, DirectoryResult};
pub use filter::{escape_input, resolve_groups_filter, resolve_users_filter};
pub use network::{Ldap3Connection, Ldap3Factory};
pub use password::{encoder_for, PasswordEncoder, UNICODE_PWD_ATTRIBUTE, USER_PASSWORD_ATTRIBUTE};
pub use provider::LdapUserProvider;
pub use types::*;
