//! Error types for Warden

use std::fmt;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

/// Errors reported by a directory connection.
///
/// This is the vocabulary shared by every `ConnectionFactory` implementation;
/// the provider wraps it into [`Error`] with the context of the failing step.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DirectoryError {
    #[error("transport error: {0}")]
    Transport(String),

    #[error("directory returned result code {code}: {message}")]
    Result { code: u32, message: String },

    #[error("empty password not allowed")]
    EmptyPassword,

    #[error("unsupported operation: {0}")]
    Unsupported(String),
}

impl DirectoryError {
    /// LDAP result code `invalidCredentials`
    pub const INVALID_CREDENTIALS: u32 = 49;

    /// LDAP result code `sizeLimitExceeded`
    pub const SIZE_LIMIT_EXCEEDED: u32 = 4;

    pub fn is_invalid_credentials(&self) -> bool {
        match self {
            DirectoryError::Result { code, .. } => *code == Self::INVALID_CREDENTIALS,
            DirectoryError::EmptyPassword => true,
            _ => false,
        }
    }
}

/// Public operation of the user provider, attached to errors for context.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    CheckUserPassword,
    GetDetails,
    UpdatePassword,
    CheckConnection,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Operation::CheckUserPassword => "check password",
            Operation::GetDetails => "retrieve details",
            Operation::UpdatePassword => "update password",
            Operation::CheckConnection => "check connection",
        };
        f.write_str(name)
    }
}

#[derive(Error, Debug)]
pub enum Error {
    // Transport Errors
    #[error("failed to connect to directory {url}: {source}")]
    Connection {
        url: String,
        #[source]
        source: DirectoryError,
    },

    #[error("bind as {dn} failed: {source}")]
    Bind {
        dn: String,
        #[source]
        source: DirectoryError,
    },

    // Lookup Errors
    #[error("user {0} not found")]
    UserNotFound(String),

    #[error("multiple users {0} found")]
    AmbiguousUser(String),

    #[error("user {username} must have exactly one value for attribute {attribute}, found {count}")]
    AttributeCardinality {
        username: String,
        attribute: String,
        count: usize,
    },

    #[error("no DN has been found for user {0}")]
    MissingDn(String),

    #[error("cannot find user DN of user {username}: {source}")]
    UserSearch {
        username: String,
        #[source]
        source: DirectoryError,
    },

    #[error("unable to retrieve groups of user {username}: {source}")]
    GroupSearch {
        username: String,
        #[source]
        source: DirectoryError,
    },

    // Write Errors
    #[error("modify request on {dn} rejected: {source}")]
    Modify {
        dn: String,
        #[source]
        source: DirectoryError,
    },

    // Configuration Errors
    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("unable to {operation} for user {username}: {source}")]
    Operation {
        operation: Operation,
        username: String,
        #[source]
        source: Box<Error>,
    },
}

/// Coarse classification of an [`Error`], independent of operation wrapping.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Connection,
    Bind,
    UserNotFound,
    AmbiguousUser,
    AttributeCardinality,
    UserSearch,
    GroupSearch,
    Modify,
    Config,
}

impl ErrorKind {
    /// True for the outcomes a login form would report as "invalid credentials".
    ///
    /// Callers facing unauthenticated users can use this to avoid revealing
    /// whether an account exists.
    pub fn is_credential_failure(&self) -> bool {
        matches!(self, ErrorKind::UserNotFound | ErrorKind::Bind)
    }
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Connection { .. } => ErrorKind::Connection,
            Error::Bind { .. } => ErrorKind::Bind,
            Error::UserNotFound(_) => ErrorKind::UserNotFound,
            Error::AmbiguousUser(_) => ErrorKind::AmbiguousUser,
            Error::AttributeCardinality { .. } => ErrorKind::AttributeCardinality,
            Error::MissingDn(_) => ErrorKind::Config,
            Error::UserSearch { .. } => ErrorKind::UserSearch,
            Error::GroupSearch { .. } => ErrorKind::GroupSearch,
            Error::Modify { .. } => ErrorKind::Modify,
            Error::Config(_) => ErrorKind::Config,
            Error::Operation { source, .. } => source.kind(),
        }
    }

    /// Wrap this error with the public operation and acting username.
    pub fn during(self, operation: Operation, username: impl Into<String>) -> Self {
        Error::Operation {
            operation,
            username: username.into(),
            source: Box::new(self),
        }
    }

    /// The directory-level error at the root of this error, if any.
    pub fn directory_error(&self) -> Option<&DirectoryError> {
        match self {
            Error::Connection { source, .. }
            | Error::Bind { source, .. }
            | Error::UserSearch { source, .. }
            | Error::GroupSearch { source, .. }
            | Error::Modify { source, .. } => Some(source),
            Error::Operation { source, .. } => source.directory_error(),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_looks_through_operation() {
        let err = Error::UserNotFound("ghost".to_string()).during(Operation::GetDetails, "ghost");

        assert_eq!(err.kind(), ErrorKind::UserNotFound);
        assert_eq!(
            err.to_string(),
            "unable to retrieve details for user ghost: user ghost not found"
        );
    }

    #[test]
    fn test_missing_dn_is_configuration_error() {
        assert_eq!(Error::MissingDn("alice".into()).kind(), ErrorKind::Config);
    }

    #[test]
    fn test_invalid_credentials_code() {
        let err = DirectoryError::Result {
            code: 49,
            message: "Invalid Credentials".to_string(),
        };
        assert!(err.is_invalid_credentials());
        assert!(!DirectoryError::Transport("reset".into()).is_invalid_credentials());

        let wrapped = Error::Bind {
            dn: "uid=bob,dc=example,dc=com".into(),
            source: err.clone(),
        }
        .during(Operation::CheckUserPassword, "bob");
        assert_eq!(wrapped.directory_error(), Some(&err));
        assert!(wrapped.kind().is_credential_failure());
    }
}
