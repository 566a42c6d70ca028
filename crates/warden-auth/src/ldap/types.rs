//! Directory request/response types and user records
//!
//! These are the values exchanged with a `DirectoryConnection`, independent
//! of any concrete LDAP client library.

use serde::{Deserialize, Serialize};
use std::fmt;

// ============================================================================
// Search
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchScope {
    Base,
    OneLevel,
    Subtree,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DerefAliases {
    Never,
    Searching,
    Finding,
    Always,
}

/// A search request against the directory
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchRequest {
    pub base_dn: String,
    pub scope: SearchScope,
    pub deref_aliases: DerefAliases,
    /// Maximum number of entries, 0 means unlimited
    pub size_limit: i32,
    pub filter: String,
    pub attributes: Vec<String>,
}

/// A directory entry returned by a search
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Entry {
    pub dn: String,
    pub attributes: Vec<Attribute>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attribute {
    pub name: String,
    pub values: Vec<String>,
}

impl Entry {
    pub fn new(dn: impl Into<String>) -> Self {
        Self {
            dn: dn.into(),
            attributes: Vec::new(),
        }
    }

    pub fn with_attribute<I, V>(mut self, name: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<String>,
    {
        self.attributes.push(Attribute {
            name: name.into(),
            values: values.into_iter().map(Into::into).collect(),
        });
        self
    }

    /// Look up an attribute; names compare case-insensitively as in LDAP.
    pub fn attribute(&self, name: &str) -> Option<&Attribute> {
        self.attributes
            .iter()
            .find(|a| a.name.eq_ignore_ascii_case(name))
    }

    pub fn values(&self, name: &str) -> &[String] {
        self.attribute(name)
            .map(|a| a.values.as_slice())
            .unwrap_or_default()
    }

    pub fn first_value(&self, name: &str) -> Option<&str> {
        self.values(name).first().map(|s| s.as_str())
    }
}

// ============================================================================
// Modify
// ============================================================================

/// Replace every value of `attribute` with `values`.
#[derive(Clone, PartialEq, Eq)]
pub struct Modification {
    pub attribute: String,
    pub values: Vec<Vec<u8>>,
}

// Values are credentials more often than not.
impl fmt::Debug for Modification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Modification")
            .field("attribute", &self.attribute)
            .field("values", &format_args!("<{} redacted>", self.values.len()))
            .finish()
    }
}

// ============================================================================
// Users
// ============================================================================

/// The single entry matching a username lookup
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserProfile {
    pub dn: String,
    pub username: String,
    /// Empty when the directory has no display name for the user
    pub display_name: String,
    pub emails: Vec<String>,
}

/// User information returned to callers
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserDetails {
    pub username: String,
    pub display_name: String,
    pub emails: Vec<String>,
    /// Group names in directory result order, duplicates preserved
    pub groups: Vec<String>,
}

impl UserDetails {
    pub fn from_profile(profile: UserProfile, groups: Vec<String>) -> Self {
        Self {
            username: profile.username,
            display_name: profile.display_name,
            emails: profile.emails,
            groups,
        }
    }
}
