//! Directory-backed user provider for Warden

pub mod ldap;

pub use ldap::{
    ConnectionFactory, DirectoryConnection, Entry, Ldap3Factory, LdapUserProvider, UserDetails,
    UserProfile,
};
