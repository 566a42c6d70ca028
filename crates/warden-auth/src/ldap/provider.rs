//! LDAP user provider
//!
//! Validates credentials, reads profile and group attributes, and updates
//! passwords. Every call dials its own connections, bound as the service
//! account or as the user, and closes them before returning.

use crate::ldap::connection::{ConnectionFactory, DirectoryConnection};
use crate::ldap::filter::{resolve_groups_filter, resolve_users_filter};
use crate::ldap::network::Ldap3Factory;
use crate::ldap::password::encoder_for;
use crate::ldap::types::*;
use std::sync::Arc;
use warden_core::{
    Diagnostics, DirectoryError, Error, NormalizedLdapConfig, Operation, Result,
    TracingDiagnostics,
};

/// Enough to tell a unique match from an ambiguous one.
const USER_SEARCH_SIZE_LIMIT: i32 = 2;

/// User provider backed by an LDAP directory or Active Directory
#[derive(Clone)]
pub struct LdapUserProvider {
    config: Arc<NormalizedLdapConfig>,
    factory: Arc<dyn ConnectionFactory>,
    diagnostics: Arc<dyn Diagnostics>,
}

impl LdapUserProvider {
    /// Create a provider talking to the network directory of `config`.
    pub fn new(config: NormalizedLdapConfig) -> Self {
        Self::with_factory(config, Arc::new(Ldap3Factory), Arc::new(TracingDiagnostics))
    }

    pub fn with_factory(
        config: NormalizedLdapConfig,
        factory: Arc<dyn ConnectionFactory>,
        diagnostics: Arc<dyn Diagnostics>,
    ) -> Self {
        Self {
            config: Arc::new(config),
            factory,
            diagnostics,
        }
    }

    pub fn config(&self) -> &NormalizedLdapConfig {
        &self.config
    }

    /// Check that `password` is valid for the user matching `username`.
    ///
    /// Returns `Ok(true)` when the user bind succeeds. An unknown user fails
    /// with kind `UserNotFound`, a wrong password with kind `Bind`.
    pub async fn check_user_password(&self, username: &str, password: &str) -> Result<bool> {
        self.authenticate(username, password)
            .await
            .map_err(|e| e.during(Operation::CheckUserPassword, username))
    }

    /// Retrieve profile and group memberships of the user matching `username`.
    pub async fn get_details(&self, username: &str) -> Result<UserDetails> {
        let mut conn = self
            .service_connection()
            .await
            .map_err(|e| e.during(Operation::GetDetails, username))?;

        let result = self.details(conn.as_mut(), username).await;
        self.release(conn).await;

        result.map_err(|e| e.during(Operation::GetDetails, username))
    }

    /// Replace the password of the user matching `username`.
    pub async fn update_password(&self, username: &str, new_password: &str) -> Result<()> {
        let mut conn = self
            .service_connection()
            .await
            .map_err(|e| e.during(Operation::UpdatePassword, username))?;

        let result = self.replace_password(conn.as_mut(), username, new_password).await;
        self.release(conn).await;

        result.map_err(|e| e.during(Operation::UpdatePassword, username))
    }

    /// Bind as the service account and disconnect.
    pub async fn check_connection(&self) -> Result<()> {
        let conn = self
            .service_connection()
            .await
            .map_err(|e| e.during(Operation::CheckConnection, self.config.user.as_str()))?;
        self.release(conn).await;

        self.diagnostics
            .debug(&format!("Service account bind to {} succeeded", self.config.url));
        Ok(())
    }

    // =========================================================================
    // Private methods
    // =========================================================================

    async fn authenticate(&self, username: &str, password: &str) -> Result<bool> {
        // Step 1: resolve the user as the service account
        let mut conn = self.service_connection().await?;
        let profile = self.user_profile(conn.as_mut(), username).await;
        self.release(conn).await;
        let profile = profile?;

        // Step 2: bind as the user on a fresh connection
        let user_conn = self.connect(&profile.dn, password).await?;
        self.release(user_conn).await;

        self.diagnostics
            .debug(&format!("Credentials of user {} validated", username));
        Ok(true)
    }

    async fn details(
        &self,
        conn: &mut dyn DirectoryConnection,
        username: &str,
    ) -> Result<UserDetails> {
        let profile = self.user_profile(conn, username).await?;
        let groups = self.user_groups(conn, username, &profile).await?;

        Ok(UserDetails::from_profile(profile, groups))
    }

    async fn replace_password(
        &self,
        conn: &mut dyn DirectoryConnection,
        username: &str,
        new_password: &str,
    ) -> Result<()> {
        let profile = self.user_profile(conn, username).await?;
        let modification = encoder_for(self.config.implementation)(new_password);

        conn.modify(&profile.dn, vec![modification])
            .await
            .map_err(|source| Error::Modify {
                dn: profile.dn.clone(),
                source,
            })?;

        self.diagnostics
            .debug(&format!("Password of user {} updated", username));
        Ok(())
    }

    async fn service_connection(&self) -> Result<Box<dyn DirectoryConnection>> {
        self.connect(&self.config.user, &self.config.password).await
    }

    /// Dial, upgrade if configured, and bind. The connection is closed again
    /// when any step fails.
    async fn connect(&self, dn: &str, password: &str) -> Result<Box<dyn DirectoryConnection>> {
        // Directories treat an empty password as an unauthenticated bind
        if password.is_empty() {
            return Err(Error::Bind {
                dn: dn.to_string(),
                source: DirectoryError::EmptyPassword,
            });
        }

        let mut conn = self
            .factory
            .dial(&self.config.url, &self.config.dial_options())
            .await
            .map_err(|source| Error::Connection {
                url: self.config.url.clone(),
                source,
            })?;

        if self.config.start_tls {
            if let Err(source) = conn.start_tls().await {
                self.release(conn).await;
                return Err(Error::Connection {
                    url: self.config.url.clone(),
                    source,
                });
            }
        }

        if let Err(source) = conn.bind(dn, password).await {
            self.release(conn).await;
            return Err(Error::Bind {
                dn: dn.to_string(),
                source,
            });
        }

        Ok(conn)
    }

    async fn release(&self, mut conn: Box<dyn DirectoryConnection>) {
        if let Err(e) = conn.close().await {
            self.diagnostics
                .warn(&format!("Failed to close directory connection: {}", e));
        }
    }

    async fn user_profile(
        &self,
        conn: &mut dyn DirectoryConnection,
        username: &str,
    ) -> Result<UserProfile> {
        let config = &self.config;
        let filter =
            resolve_users_filter(&config.users_filter, username, &config.special_characters);
        self.diagnostics
            .trace(&format!("Computed user filter is {}", filter));

        let request = SearchRequest {
            base_dn: config.users_dn.clone(),
            scope: SearchScope::Subtree,
            deref_aliases: DerefAliases::Never,
            size_limit: USER_SEARCH_SIZE_LIMIT,
            filter,
            attributes: vec![
                "dn".to_string(),
                config.display_name_attribute.clone(),
                config.mail_attribute.clone(),
                config.username_attribute.clone(),
            ],
        };

        let mut entries = conn
            .search(request)
            .await
            .map_err(|source| Error::UserSearch {
                username: username.to_string(),
                source,
            })?;

        let entry = match entries.len() {
            0 => return Err(Error::UserNotFound(username.to_string())),
            1 => entries.remove(0),
            _ => return Err(Error::AmbiguousUser(username.to_string())),
        };

        self.profile_from_entry(entry, username)
    }

    fn profile_from_entry(&self, entry: Entry, username: &str) -> Result<UserProfile> {
        let config = &self.config;

        let usernames = entry.values(&config.username_attribute);
        if usernames.len() != 1 {
            return Err(Error::AttributeCardinality {
                username: username.to_string(),
                attribute: config.username_attribute.clone(),
                count: usernames.len(),
            });
        }

        if entry.dn.is_empty() {
            return Err(Error::MissingDn(username.to_string()));
        }

        Ok(UserProfile {
            username: usernames[0].clone(),
            display_name: entry
                .first_value(&config.display_name_attribute)
                .unwrap_or_default()
                .to_string(),
            emails: entry.values(&config.mail_attribute).to_vec(),
            dn: entry.dn,
        })
    }

    async fn user_groups(
        &self,
        conn: &mut dyn DirectoryConnection,
        username: &str,
        profile: &UserProfile,
    ) -> Result<Vec<String>> {
        let config = &self.config;
        let filter = resolve_groups_filter(
            &config.groups_filter,
            username,
            Some(profile),
            &config.special_characters,
        );
        self.diagnostics
            .trace(&format!("Computed groups filter is {}", filter));

        let request = SearchRequest {
            base_dn: config.groups_dn.clone(),
            scope: SearchScope::Subtree,
            deref_aliases: DerefAliases::Never,
            size_limit: 0,
            filter,
            attributes: vec![config.group_name_attribute.clone()],
        };

        let entries = conn
            .search(request)
            .await
            .map_err(|source| Error::GroupSearch {
                username: username.to_string(),
                source,
            })?;

        let mut groups = Vec::new();
        for entry in entries {
            if entry.attributes.is_empty() {
                self.diagnostics.warn(&format!(
                    "Group entry {} returned no attributes for user {}",
                    entry.dn, username
                ));
                continue;
            }
            // Normally a single value per group entry
            groups.extend(entry.values(&config.group_name_attribute).iter().cloned());
        }

        self.diagnostics
            .debug(&format!("Found {} groups for user {}", groups.len(), username));
        Ok(groups)
    }
}
