//! CLI command implementations

pub mod check;
pub mod details;
pub mod passwd;
pub mod ping;

use crate::OutputFormat;
use anyhow::{bail, Context, Result};
use std::io::BufRead;
use warden_auth::LdapUserProvider;

/// Context passed to all commands
pub struct CommandContext {
    pub provider: LdapUserProvider,
    pub output_format: OutputFormat,
    pub quiet: bool,
}

impl CommandContext {
    /// Check if output should be JSON
    pub fn is_json(&self) -> bool {
        matches!(self.output_format, OutputFormat::Json)
    }

    /// Print info message if not quiet
    pub fn info(&self, msg: &str) {
        if !self.quiet {
            println!("{}", msg);
        }
    }
}

/// Use `value` when given, otherwise read one line from `input`.
pub fn secret_or_line(value: Option<String>, input: impl BufRead, what: &str) -> Result<String> {
    if let Some(value) = value {
        return Ok(value);
    }

    let mut line = String::new();
    input
        .take(64 * 1024)
        .read_line(&mut line)
        .with_context(|| format!("Failed to read {} from stdin", what))?;

    let secret = line.trim_end_matches(&['\r', '\n'][..]).to_string();
    if secret.is_empty() {
        bail!("No {} given", what);
    }
    Ok(secret)
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use std::sync::Arc;
    use warden_auth::ldap::memory::MemoryDirectory;
    use warden_auth::Entry;
    use warden_core::diagnostics::CapturedDiagnostics;
    use warden_core::LdapConfig;

    pub const ADMIN_DN: &str = "cn=admin,dc=example,dc=com";
    pub const JOHN_DN: &str = "uid=john,ou=users,dc=example,dc=com";

    pub fn directory() -> MemoryDirectory {
        MemoryDirectory::new()
            .with_credentials(ADMIN_DN, "admin")
            .with_credentials(JOHN_DN, "password")
            .with_search_result(
                "ou=users,dc=example,dc=com",
                "(&(uid=john)(objectClass=person))",
                vec![Entry::new(JOHN_DN)
                    .with_attribute("uid", ["john"])
                    .with_attribute("displayName", ["John Doe"])
                    .with_attribute("mail", ["john@example.com"])],
            )
            .with_search_result(
                "ou=groups,dc=example,dc=com",
                format!("(&(member={})(objectClass=groupOfNames))", JOHN_DN),
                vec![Entry::new("cn=dev,ou=groups,dc=example,dc=com")
                    .with_attribute("cn", ["dev"])],
            )
    }

    pub fn context(directory: &MemoryDirectory, output_format: OutputFormat) -> CommandContext {
        let config = LdapConfig {
            url: "ldap://127.0.0.1:389".to_string(),
            base_dn: "dc=example,dc=com".to_string(),
            additional_users_dn: Some("ou=users".to_string()),
            additional_groups_dn: Some("ou=groups".to_string()),
            user: ADMIN_DN.to_string(),
            password: "admin".to_string(),
            ..Default::default()
        }
        .normalize(&CapturedDiagnostics::default())
        .unwrap();

        CommandContext {
            provider: LdapUserProvider::with_factory(
                config,
                Arc::new(directory.clone()),
                Arc::new(CapturedDiagnostics::default()),
            ),
            output_format,
            quiet: true,
        }
    }
}
