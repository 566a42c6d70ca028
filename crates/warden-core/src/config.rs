//! Configuration for Warden
//!
//! [`LdapConfig`] is the raw, deserialized form of the `[ldap]` section.
//! It is turned once, at load time, into an immutable
//! [`NormalizedLdapConfig`] by [`LdapConfig::normalize`]: implementation
//! defaults are applied, deprecated filter placeholders are rewritten,
//! attribute placeholders are expanded and the search scopes are computed.

use crate::diagnostics::Diagnostics;
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::time::Duration;

/// Raw user input, escaped before substitution.
pub const PLACEHOLDER_INPUT: &str = "{input}";
/// Resolved username of the profile (groups filter only).
pub const PLACEHOLDER_USERNAME: &str = "{username}";
/// Resolved DN of the profile (groups filter only).
pub const PLACEHOLDER_DN: &str = "{dn}";
pub const PLACEHOLDER_USERNAME_ATTRIBUTE: &str = "{username_attribute}";
pub const PLACEHOLDER_MAIL_ATTRIBUTE: &str = "{mail_attribute}";
pub const PLACEHOLDER_DISPLAY_NAME_ATTRIBUTE: &str = "{display_name_attribute}";

const LEGACY_INPUT: &str = "{0}";
const LEGACY_USERNAME: &str = "{1}";

/// Characters that must never be configured as additional special characters,
/// since RFC 4515 escaping already owns them.
const RESERVED_FILTER_CHARACTERS: [char; 5] = ['\\', '*', '(', ')', '\0'];

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WardenConfig {
    #[serde(default)]
    pub logging: LoggingConfig,

    #[serde(default)]
    pub ldap: LdapConfig,
}

impl WardenConfig {
    pub fn from_file(path: &str) -> crate::Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("Failed to read config {}: {}", path, e)))?;

        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> crate::Result<Self> {
        toml::from_str(content).map_err(|e| Error::Config(format!("Failed to parse config: {}", e)))
    }

    /// Build the configuration from `WARDEN_*` environment variables.
    pub fn from_env() -> crate::Result<Self> {
        Self::from_vars(|name| std::env::var(name).ok())
    }

    /// Same as [`from_env`](Self::from_env), reading variables through `var`.
    pub fn from_vars(var: impl Fn(&str) -> Option<String>) -> crate::Result<Self> {
        let mut config = Self::default();

        if let Some(level) = var("WARDEN_LOG_LEVEL") {
            config.logging.level = level;
        }
        if let Some(format) = var("WARDEN_LOG_FORMAT") {
            config.logging.format = format;
        }

        let ldap = &mut config.ldap;
        if let Some(url) = var("WARDEN_LDAP_URL") {
            ldap.url = url;
        }
        if let Some(start_tls) = var("WARDEN_LDAP_START_TLS") {
            ldap.start_tls = parse_flag("WARDEN_LDAP_START_TLS", &start_tls)?;
        }
        if let Some(skip_verify) = var("WARDEN_LDAP_TLS_SKIP_VERIFY") {
            ldap.tls.skip_verify = parse_flag("WARDEN_LDAP_TLS_SKIP_VERIFY", &skip_verify)?;
        }
        ldap.tls.ca_file = var("WARDEN_LDAP_TLS_CA_FILE");
        ldap.tls.server_name = var("WARDEN_LDAP_TLS_SERVER_NAME");
        if let Some(version) = var("WARDEN_LDAP_TLS_MINIMUM_VERSION") {
            ldap.tls.minimum_version = match version.as_str() {
                "1.2" => TlsVersion::Tls12,
                "1.3" => TlsVersion::Tls13,
                other => {
                    return Err(Error::Config(format!(
                        "WARDEN_LDAP_TLS_MINIMUM_VERSION must be 1.2 or 1.3, got {:?}",
                        other
                    )))
                }
            };
        }
        if let Some(timeout) = var("WARDEN_LDAP_TIMEOUT_SECONDS") {
            ldap.timeout_seconds = timeout.parse().map_err(|e| {
                Error::Config(format!(
                    "WARDEN_LDAP_TIMEOUT_SECONDS must be a number of seconds, got {:?}: {}",
                    timeout, e
                ))
            })?;
        }
        if let Some(implementation) = var("WARDEN_LDAP_IMPLEMENTATION") {
            ldap.implementation = match implementation.as_str() {
                "active_directory" => Implementation::ActiveDirectory,
                "custom" => Implementation::Custom,
                other => {
                    return Err(Error::Config(format!(
                        "WARDEN_LDAP_IMPLEMENTATION must be custom or active_directory, got {:?}",
                        other
                    )))
                }
            };
        }
        if let Some(base_dn) = var("WARDEN_LDAP_BASE_DN") {
            ldap.base_dn = base_dn;
        }
        ldap.additional_users_dn = var("WARDEN_LDAP_ADDITIONAL_USERS_DN");
        ldap.additional_groups_dn = var("WARDEN_LDAP_ADDITIONAL_GROUPS_DN");
        ldap.users_filter = var("WARDEN_LDAP_USERS_FILTER");
        ldap.groups_filter = var("WARDEN_LDAP_GROUPS_FILTER");
        ldap.username_attribute = var("WARDEN_LDAP_USERNAME_ATTRIBUTE");
        ldap.mail_attribute = var("WARDEN_LDAP_MAIL_ATTRIBUTE");
        ldap.display_name_attribute = var("WARDEN_LDAP_DISPLAY_NAME_ATTRIBUTE");
        ldap.group_name_attribute = var("WARDEN_LDAP_GROUP_NAME_ATTRIBUTE");
        if let Some(user) = var("WARDEN_LDAP_USER") {
            ldap.user = user;
        }
        if let Some(password) = var("WARDEN_LDAP_PASSWORD") {
            ldap.password = password;
        }

        Ok(config)
    }
}

fn parse_flag(name: &str, value: &str) -> crate::Result<bool> {
    match value {
        "true" | "1" => Ok(true),
        "false" | "0" => Ok(false),
        other => Err(Error::Config(format!(
            "{} must be true or false, got {:?}",
            name, other
        ))),
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
    /// `pretty` or `json`
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
        }
    }
}

/// Directory implementation, selecting defaults and the password encoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Implementation {
    /// Any LDAPv3 directory (OpenLDAP, 389 Directory Server, ...)
    #[default]
    Custom,
    /// Microsoft Active Directory
    ActiveDirectory,
}

impl Implementation {
    pub fn default_users_filter(&self) -> &'static str {
        match self {
            Implementation::ActiveDirectory => {
                "(&(|({username_attribute}={input})({mail_attribute}={input}))(sAMAccountType=805306368)(!(userAccountControl:1.2.840.113556.1.4.803:=2)))"
            }
            Implementation::Custom => "(&({username_attribute}={input})(objectClass=person))",
        }
    }

    pub fn default_groups_filter(&self) -> &'static str {
        match self {
            Implementation::ActiveDirectory => "(&(member={dn})(sAMAccountType=268435456))",
            Implementation::Custom => "(&(member={dn})(objectClass=groupOfNames))",
        }
    }

    pub fn default_username_attribute(&self) -> &'static str {
        match self {
            Implementation::ActiveDirectory => "sAMAccountName",
            Implementation::Custom => "uid",
        }
    }

    pub fn default_mail_attribute(&self) -> &'static str {
        "mail"
    }

    pub fn default_display_name_attribute(&self) -> &'static str {
        "displayName"
    }

    pub fn default_group_name_attribute(&self) -> &'static str {
        "cn"
    }
}

/// Lowest TLS protocol version accepted from the directory
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum TlsVersion {
    #[default]
    #[serde(rename = "1.2")]
    Tls12,
    #[serde(rename = "1.3")]
    Tls13,
}

/// Transport security settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LdapTlsConfig {
    /// Skip certificate verification (not recommended for production)
    #[serde(default)]
    pub skip_verify: bool,

    /// PEM bundle of additional trusted CA certificates
    #[serde(default)]
    pub ca_file: Option<String>,

    /// Name the server certificate is verified against instead of the URL host
    #[serde(default)]
    pub server_name: Option<String>,

    #[serde(default)]
    pub minimum_version: TlsVersion,
}

/// TLS settings carried to the connection factory
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TlsOptions {
    pub skip_verify: bool,
    pub ca_file: Option<String>,
    pub server_name: Option<String>,
    pub minimum_version: TlsVersion,
}

impl TlsOptions {
    /// True when only the stock TLS client settings are needed.
    pub fn is_default(&self) -> bool {
        self.ca_file.is_none()
            && self.server_name.is_none()
            && self.minimum_version == TlsVersion::Tls12
    }
}

/// LDAP/Active Directory backend configuration
#[derive(Clone, Serialize, Deserialize)]
pub struct LdapConfig {
    /// Directory URL (ldap:// or ldaps://)
    #[serde(default = "default_ldap_url")]
    pub url: String,

    /// Upgrade plaintext connections with STARTTLS
    #[serde(default)]
    pub start_tls: bool,

    #[serde(default)]
    pub tls: LdapTlsConfig,

    /// Connection and operation timeout in seconds
    #[serde(default = "default_ldap_timeout")]
    pub timeout_seconds: u64,

    #[serde(default)]
    pub implementation: Implementation,

    #[serde(default)]
    pub base_dn: String,

    /// Prepended to `base_dn` for user searches
    /// Example: "ou=users"
    #[serde(default)]
    pub additional_users_dn: Option<String>,

    /// Prepended to `base_dn` for group searches
    #[serde(default)]
    pub additional_groups_dn: Option<String>,

    /// Users filter template, must contain {input}
    /// Example: "(&({username_attribute}={input})(objectClass=person))"
    #[serde(default)]
    pub users_filter: Option<String>,

    /// Groups filter template, may use {input}, {username} and {dn}
    /// Example: "(&(member={dn})(objectClass=groupOfNames))"
    #[serde(default)]
    pub groups_filter: Option<String>,

    #[serde(default)]
    pub username_attribute: Option<String>,

    #[serde(default)]
    pub mail_attribute: Option<String>,

    #[serde(default)]
    pub display_name_attribute: Option<String>,

    #[serde(default)]
    pub group_name_attribute: Option<String>,

    /// Service account DN
    #[serde(default)]
    pub user: String,

    /// Service account password
    #[serde(default, skip_serializing)]
    pub password: String,

    /// Characters re-escaped with a backslash in user input
    #[serde(default = "default_special_characters")]
    pub special_characters: String,
}

fn default_ldap_url() -> String {
    "ldap://localhost:389".to_string()
}

fn default_ldap_timeout() -> u64 {
    crate::DEFAULT_LDAP_TIMEOUT_SECS
}

fn default_special_characters() -> String {
    crate::DEFAULT_SPECIAL_CHARACTERS.to_string()
}

impl Default for LdapConfig {
    fn default() -> Self {
        Self {
            url: default_ldap_url(),
            start_tls: false,
            tls: LdapTlsConfig::default(),
            timeout_seconds: default_ldap_timeout(),
            implementation: Implementation::default(),
            base_dn: String::new(),
            additional_users_dn: None,
            additional_groups_dn: None,
            users_filter: None,
            groups_filter: None,
            username_attribute: None,
            mail_attribute: None,
            display_name_attribute: None,
            group_name_attribute: None,
            user: String::new(),
            password: String::new(),
            special_characters: default_special_characters(),
        }
    }
}

impl std::fmt::Debug for LdapConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LdapConfig")
            .field("url", &self.url)
            .field("start_tls", &self.start_tls)
            .field("tls", &self.tls)
            .field("timeout_seconds", &self.timeout_seconds)
            .field("implementation", &self.implementation)
            .field("base_dn", &self.base_dn)
            .field("additional_users_dn", &self.additional_users_dn)
            .field("additional_groups_dn", &self.additional_groups_dn)
            .field("users_filter", &self.users_filter)
            .field("groups_filter", &self.groups_filter)
            .field("user", &self.user)
            .field("password", &"<redacted>")
            .finish_non_exhaustive()
    }
}

/// Options handed to the connection factory when dialing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DialOptions {
    pub start_tls: bool,
    pub timeout: Duration,
    pub tls: TlsOptions,
}

/// Immutable, validated form of [`LdapConfig`].
///
/// Only [`LdapConfig::normalize`] builds it.
#[derive(Clone)]
#[non_exhaustive]
pub struct NormalizedLdapConfig {
    pub url: String,
    pub start_tls: bool,
    pub tls: TlsOptions,
    pub timeout: Duration,
    pub implementation: Implementation,
    pub users_dn: String,
    pub groups_dn: String,
    pub users_filter: String,
    pub groups_filter: String,
    pub username_attribute: String,
    pub mail_attribute: String,
    pub display_name_attribute: String,
    pub group_name_attribute: String,
    pub user: String,
    pub password: String,
    pub special_characters: String,
}

impl std::fmt::Debug for NormalizedLdapConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NormalizedLdapConfig")
            .field("url", &self.url)
            .field("start_tls", &self.start_tls)
            .field("tls", &self.tls)
            .field("implementation", &self.implementation)
            .field("users_dn", &self.users_dn)
            .field("groups_dn", &self.groups_dn)
            .field("users_filter", &self.users_filter)
            .field("groups_filter", &self.groups_filter)
            .field("user", &self.user)
            .finish_non_exhaustive()
    }
}

impl NormalizedLdapConfig {
    pub fn dial_options(&self) -> DialOptions {
        DialOptions {
            start_tls: self.start_tls,
            timeout: self.timeout,
            tls: self.tls.clone(),
        }
    }
}

impl LdapConfig {
    /// Apply defaults, rewrite and expand filter placeholders, compute the
    /// search scopes and validate the result.
    pub fn normalize(self, diagnostics: &dyn Diagnostics) -> Result<NormalizedLdapConfig> {
        let implementation = self.implementation;

        let username_attribute = non_empty_or(self.username_attribute, || {
            implementation.default_username_attribute()
        });
        let mail_attribute =
            non_empty_or(self.mail_attribute, || implementation.default_mail_attribute());
        let display_name_attribute = non_empty_or(self.display_name_attribute, || {
            implementation.default_display_name_attribute()
        });
        let group_name_attribute = non_empty_or(self.group_name_attribute, || {
            implementation.default_group_name_attribute()
        });

        let users_filter = non_empty_or(self.users_filter, || implementation.default_users_filter());
        let groups_filter =
            non_empty_or(self.groups_filter, || implementation.default_groups_filter());

        if users_filter.contains(LEGACY_INPUT) {
            diagnostics.warn(
                "DEPRECATION NOTICE: `{0}` in the LDAP users filter is deprecated, use `{input}` instead",
            );
        }
        if groups_filter.contains(LEGACY_INPUT) {
            diagnostics.warn(
                "DEPRECATION NOTICE: `{0}` in the LDAP groups filter is deprecated, use `{input}` instead",
            );
        }
        if groups_filter.contains(LEGACY_USERNAME) {
            diagnostics.warn(
                "DEPRECATION NOTICE: `{1}` in the LDAP groups filter is deprecated, use `{username}` instead",
            );
        }

        let expand = |template: &str| {
            expand_attribute_placeholders(
                template,
                &username_attribute,
                &mail_attribute,
                &display_name_attribute,
            )
        };
        let users_filter = expand(&rewrite_legacy_users_filter(&users_filter));
        let groups_filter = expand(&rewrite_legacy_groups_filter(&groups_filter));

        if self.tls.skip_verify {
            diagnostics.warn("LDAP TLS certificate verification is disabled");
        }

        let normalized = NormalizedLdapConfig {
            users_dn: scoped_dn(self.additional_users_dn.as_deref(), &self.base_dn),
            groups_dn: scoped_dn(self.additional_groups_dn.as_deref(), &self.base_dn),
            url: self.url,
            start_tls: self.start_tls,
            tls: TlsOptions {
                skip_verify: self.tls.skip_verify,
                ca_file: self.tls.ca_file,
                server_name: self.tls.server_name,
                minimum_version: self.tls.minimum_version,
            },
            timeout: Duration::from_secs(self.timeout_seconds),
            implementation,
            users_filter,
            groups_filter,
            username_attribute,
            mail_attribute,
            display_name_attribute,
            group_name_attribute,
            user: self.user,
            password: self.password,
            special_characters: self.special_characters,
        };

        if self.base_dn.is_empty() {
            return Err(Error::Config("base_dn is required".to_string()));
        }
        validate(&normalized)?;

        diagnostics.debug(&format!(
            "LDAP backend configured: url={} users_dn={} groups_dn={}",
            normalized.url, normalized.users_dn, normalized.groups_dn
        ));

        Ok(normalized)
    }
}

fn non_empty_or(value: Option<String>, default: impl FnOnce() -> &'static str) -> String {
    match value {
        Some(v) if !v.is_empty() => v,
        _ => default().to_string(),
    }
}

fn validate(config: &NormalizedLdapConfig) -> Result<()> {
    if config.url.is_empty() {
        return Err(Error::Config("url is required".to_string()));
    }

    let ldaps = config.url.starts_with("ldaps://");
    if !ldaps && !config.url.starts_with("ldap://") {
        return Err(Error::Config(
            "url must start with ldap:// or ldaps://".to_string(),
        ));
    }

    if ldaps && config.start_tls {
        return Err(Error::Config(
            "start_tls cannot be used with an ldaps:// url".to_string(),
        ));
    }

    if config.timeout.is_zero() {
        return Err(Error::Config("timeout_seconds must be positive".to_string()));
    }

    if config.user.is_empty() {
        return Err(Error::Config("user is required".to_string()));
    }

    if !config.users_filter.contains(PLACEHOLDER_INPUT) {
        return Err(Error::Config(format!(
            "users_filter must contain the {} placeholder",
            PLACEHOLDER_INPUT
        )));
    }

    // Hex digits would be mistaken for the second half of a `\xx` escape
    if let Some(c) = config
        .special_characters
        .chars()
        .find(|c| RESERVED_FILTER_CHARACTERS.contains(c) || c.is_ascii_hexdigit())
    {
        return Err(Error::Config(format!(
            "special_characters must not contain {:?}",
            c
        )));
    }

    if config.tls.ca_file.as_deref() == Some("") {
        return Err(Error::Config("tls.ca_file must not be empty".to_string()));
    }
    if config.tls.server_name.as_deref() == Some("") {
        return Err(Error::Config("tls.server_name must not be empty".to_string()));
    }

    Ok(())
}

/// Search scope for users or groups: `additional,base` or `base` alone.
pub fn scoped_dn(additional: Option<&str>, base_dn: &str) -> String {
    match additional {
        Some(additional) if !additional.is_empty() => format!("{},{}", additional, base_dn),
        _ => base_dn.to_string(),
    }
}

/// Rewrite the deprecated `{0}` alias of a users filter to `{input}`.
pub fn rewrite_legacy_users_filter(template: &str) -> Cow<'_, str> {
    if template.contains(LEGACY_INPUT) {
        Cow::Owned(template.replace(LEGACY_INPUT, PLACEHOLDER_INPUT))
    } else {
        Cow::Borrowed(template)
    }
}

/// Rewrite the deprecated `{0}`/`{1}` aliases of a groups filter to
/// `{input}`/`{username}`.
pub fn rewrite_legacy_groups_filter(template: &str) -> Cow<'_, str> {
    if template.contains(LEGACY_INPUT) || template.contains(LEGACY_USERNAME) {
        Cow::Owned(
            template
                .replace(LEGACY_INPUT, PLACEHOLDER_INPUT)
                .replace(LEGACY_USERNAME, PLACEHOLDER_USERNAME),
        )
    } else {
        Cow::Borrowed(template)
    }
}

pub fn expand_attribute_placeholders(
    template: &str,
    username_attribute: &str,
    mail_attribute: &str,
    display_name_attribute: &str,
) -> String {
    template
        .replace(PLACEHOLDER_USERNAME_ATTRIBUTE, username_attribute)
        .replace(PLACEHOLDER_MAIL_ATTRIBUTE, mail_attribute)
        .replace(PLACEHOLDER_DISPLAY_NAME_ATTRIBUTE, display_name_attribute)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostics::CapturedDiagnostics;

    fn base_config() -> LdapConfig {
        LdapConfig {
            url: "ldap://127.0.0.1:389".to_string(),
            base_dn: "dc=example,dc=com".to_string(),
            user: "cn=admin,dc=example,dc=com".to_string(),
            password: "password".to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn test_scoped_dn() {
        assert_eq!(scoped_dn(None, "dc=example,dc=com"), "dc=example,dc=com");
        assert_eq!(scoped_dn(Some(""), "dc=example,dc=com"), "dc=example,dc=com");
        assert_eq!(
            scoped_dn(Some("ou=users"), "dc=example,dc=com"),
            "ou=users,dc=example,dc=com"
        );
    }

    #[test]
    fn test_search_scopes_computed_once() {
        let config = LdapConfig {
            additional_users_dn: Some("ou=users".to_string()),
            ..base_config()
        }
        .normalize(&CapturedDiagnostics::default())
        .unwrap();

        assert_eq!(config.users_dn, "ou=users,dc=example,dc=com");
        assert_eq!(config.groups_dn, "dc=example,dc=com");
    }

    #[test]
    fn test_custom_defaults() {
        let config = base_config()
            .normalize(&CapturedDiagnostics::default())
            .unwrap();

        assert_eq!(config.users_filter, "(&(uid={input})(objectClass=person))");
        assert_eq!(config.groups_filter, "(&(member={dn})(objectClass=groupOfNames))");
        assert_eq!(config.username_attribute, "uid");
        assert_eq!(config.display_name_attribute, "displayName");
        assert_eq!(config.group_name_attribute, "cn");
    }

    #[test]
    fn test_active_directory_defaults() {
        let config = LdapConfig {
            implementation: Implementation::ActiveDirectory,
            ..base_config()
        }
        .normalize(&CapturedDiagnostics::default())
        .unwrap();

        assert_eq!(config.username_attribute, "sAMAccountName");
        assert!(config
            .users_filter
            .starts_with("(&(|(sAMAccountName={input})(mail={input}))"));
    }

    #[test]
    fn test_legacy_placeholders_rewritten_with_warning() {
        let diagnostics = CapturedDiagnostics::default();
        let config = LdapConfig {
            users_filter: Some("(&(uid={0})(objectClass=person))".to_string()),
            groups_filter: Some("(&(memberUid={1})(cn={0}))".to_string()),
            ..base_config()
        }
        .normalize(&diagnostics)
        .unwrap();

        assert_eq!(config.users_filter, "(&(uid={input})(objectClass=person))");
        assert_eq!(config.groups_filter, "(&(memberUid={username})(cn={input}))");
        assert_eq!(diagnostics.warnings().len(), 3);
    }

    #[test]
    fn test_legacy_rewrite_is_idempotent() {
        let raw = "(|(uid={0})(mail={0})(memberUid={1}))";

        let once = rewrite_legacy_groups_filter(raw).into_owned();
        let twice = rewrite_legacy_groups_filter(&once).into_owned();
        assert_eq!(once, twice);

        let once = rewrite_legacy_users_filter(raw).into_owned();
        assert_eq!(rewrite_legacy_users_filter(&once), once);
    }

    #[test]
    fn test_normalized_filters_do_not_warn_again() {
        let first = CapturedDiagnostics::default();
        let normalized = LdapConfig {
            users_filter: Some("(uid={0})".to_string()),
            ..base_config()
        }
        .normalize(&first)
        .unwrap();
        assert_eq!(first.warnings().len(), 1);

        let second = CapturedDiagnostics::default();
        let again = LdapConfig {
            users_filter: Some(normalized.users_filter.clone()),
            groups_filter: Some(normalized.groups_filter.clone()),
            ..base_config()
        }
        .normalize(&second)
        .unwrap();
        assert!(second.warnings().is_empty());
        assert_eq!(again.users_filter, normalized.users_filter);
    }

    #[test]
    fn test_attribute_placeholders_expanded() {
        let config = LdapConfig {
            users_filter: Some(
                "(|({username_attribute}={input})({mail_attribute}={input})({display_name_attribute}={input}))"
                    .to_string(),
            ),
            username_attribute: Some("sAMAccountName".to_string()),
            ..base_config()
        }
        .normalize(&CapturedDiagnostics::default())
        .unwrap();

        assert_eq!(
            config.users_filter,
            "(|(sAMAccountName={input})(mail={input})(displayName={input}))"
        );
    }

    #[test]
    fn test_config_validation() {
        let diagnostics = CapturedDiagnostics::default();

        let err = LdapConfig {
            base_dn: String::new(),
            ..base_config()
        }
        .normalize(&diagnostics)
        .unwrap_err();
        assert!(matches!(err, Error::Config(_)));

        assert!(LdapConfig {
            url: "http://example.com".to_string(),
            ..base_config()
        }
        .normalize(&diagnostics)
        .is_err());

        assert!(LdapConfig {
            url: "ldaps://127.0.0.1".to_string(),
            start_tls: true,
            ..base_config()
        }
        .normalize(&diagnostics)
        .is_err());

        assert!(LdapConfig {
            users_filter: Some("(uid=admin)".to_string()),
            ..base_config()
        }
        .normalize(&diagnostics)
        .is_err());

        assert!(LdapConfig {
            special_characters: "\\".to_string(),
            ..base_config()
        }
        .normalize(&diagnostics)
        .is_err());

        for special in ["2a", ",#c", "5"] {
            let err = LdapConfig {
                special_characters: special.to_string(),
                ..base_config()
            }
            .normalize(&diagnostics)
            .unwrap_err();
            assert!(err.to_string().contains("special_characters"), "{}", special);
        }

        assert!(LdapConfig {
            tls: LdapTlsConfig {
                server_name: Some(String::new()),
                ..Default::default()
            },
            ..base_config()
        }
        .normalize(&diagnostics)
        .is_err());
    }

    #[test]
    fn test_tls_settings_carried_to_dial_options() {
        let config = LdapConfig {
            url: "ldaps://dc1.example.com".to_string(),
            tls: LdapTlsConfig {
                ca_file: Some("/etc/warden/ca.pem".to_string()),
                server_name: Some("ldap.example.com".to_string()),
                minimum_version: TlsVersion::Tls13,
                ..Default::default()
            },
            ..base_config()
        }
        .normalize(&CapturedDiagnostics::default())
        .unwrap();

        let options = config.dial_options();
        assert!(!options.tls.is_default());
        assert_eq!(options.tls.ca_file.as_deref(), Some("/etc/warden/ca.pem"));
        assert_eq!(options.tls.server_name.as_deref(), Some("ldap.example.com"));
        assert_eq!(options.tls.minimum_version, TlsVersion::Tls13);

        let plain = base_config()
            .normalize(&CapturedDiagnostics::default())
            .unwrap();
        assert!(plain.dial_options().tls.is_default());
    }

    #[test]
    fn test_from_vars() {
        let vars = |pairs: &'static [(&'static str, &'static str)]| {
            move |name: &str| {
                pairs
                    .iter()
                    .find(|(key, _)| *key == name)
                    .map(|(_, value)| value.to_string())
            }
        };

        let config = WardenConfig::from_vars(vars(&[
            ("WARDEN_LDAP_URL", "ldap://dc.example.com"),
            ("WARDEN_LDAP_START_TLS", "true"),
            ("WARDEN_LDAP_TIMEOUT_SECONDS", "10"),
            ("WARDEN_LDAP_IMPLEMENTATION", "active_directory"),
            ("WARDEN_LDAP_TLS_MINIMUM_VERSION", "1.3"),
        ]))
        .unwrap();
        assert_eq!(config.ldap.url, "ldap://dc.example.com");
        assert!(config.ldap.start_tls);
        assert_eq!(config.ldap.timeout_seconds, 10);
        assert_eq!(config.ldap.implementation, Implementation::ActiveDirectory);
        assert_eq!(config.ldap.tls.minimum_version, TlsVersion::Tls13);

        let err =
            WardenConfig::from_vars(vars(&[("WARDEN_LDAP_TIMEOUT_SECONDS", "5s")])).unwrap_err();
        assert!(err.to_string().contains("WARDEN_LDAP_TIMEOUT_SECONDS"));

        let err = WardenConfig::from_vars(vars(&[(
            "WARDEN_LDAP_IMPLEMENTATION",
            "activedirectory",
        )]))
        .unwrap_err();
        assert!(err.to_string().contains("WARDEN_LDAP_IMPLEMENTATION"));

        assert!(WardenConfig::from_vars(vars(&[("WARDEN_LDAP_START_TLS", "yes")])).is_err());
        assert!(
            WardenConfig::from_vars(vars(&[("WARDEN_LDAP_TLS_MINIMUM_VERSION", "1.1")])).is_err()
        );
    }

    #[test]
    fn test_password_not_exposed() {
        let config = LdapConfig {
            password: "hunter2".to_string(),
            ..base_config()
        };

        assert!(!format!("{:?}", config).contains("hunter2"));
        assert!(!toml::to_string(&config).unwrap().contains("hunter2"));

        let normalized = config.normalize(&CapturedDiagnostics::default()).unwrap();
        assert!(!format!("{:?}", normalized).contains("hunter2"));
    }

    #[test]
    fn test_from_toml() {
        let config = WardenConfig::from_toml(
            r#"
            [logging]
            level = "debug"
            format = "json"

            [ldap]
            url = "ldaps://dc.example.com"
            implementation = "active_directory"
            base_dn = "dc=example,dc=com"
            additional_users_dn = "ou=users"
            user = "cn=svc,dc=example,dc=com"
            password = "secret"

            [ldap.tls]
            skip_verify = true
            "#,
        )
        .unwrap();

        assert_eq!(config.logging.format, "json");
        assert_eq!(config.ldap.implementation, Implementation::ActiveDirectory);
        assert!(config.ldap.tls.skip_verify);
        assert_eq!(config.ldap.timeout_seconds, crate::DEFAULT_LDAP_TIMEOUT_SECS);

        let diagnostics = CapturedDiagnostics::default();
        let normalized = config.ldap.normalize(&diagnostics).unwrap();
        assert_eq!(diagnostics.warnings(), ["LDAP TLS certificate verification is disabled"]);
        assert_eq!(normalized.users_dn, "ou=users,dc=example,dc=com");
        assert_eq!(normalized.dial_options().timeout, Duration::from_secs(5));
    }
}
