//! Network directory connections backed by `ldap3`
//!
//! Supports LDAP, LDAPS (SSL) and STARTTLS. `ldap3` negotiates STARTTLS while
//! establishing the connection, so the upgrade is requested through
//! [`DialOptions::start_tls`] and `start_tls` only confirms it happened.
//!
//! Without TLS settings beyond `skip_verify` the stock `ldap3` TLS setup is
//! used. A CA bundle, server name or minimum version builds our own rustls
//! configuration.

use crate::ldap::connection::{ConnectionFactory, DirectoryConnection, DirectoryResult};
use crate::ldap::types::{Attribute, DerefAliases, Entry, Modification, SearchRequest, SearchScope};
use async_trait::async_trait;
use ldap3::{
    Ldap, LdapConnAsync, LdapConnSettings, LdapError, Mod, Scope, SearchEntry, SearchOptions,
    SearchResult,
};
use rustls::client::{ServerCertVerified, ServerCertVerifier, WebPkiVerifier};
use rustls::{Certificate, ClientConfig, RootCertStore, ServerName};
use std::collections::HashSet;
use std::fs::File;
use std::io::BufReader;
use std::sync::Arc;
use std::time::{Duration, SystemTime};
use tracing::{debug, warn};
use warden_core::{DialOptions, DirectoryError, TlsOptions, TlsVersion};

/// Dials real directories over the network
#[derive(Debug, Clone, Copy, Default)]
pub struct Ldap3Factory;

#[async_trait]
impl ConnectionFactory for Ldap3Factory {
    async fn dial(
        &self,
        url: &str,
        options: &DialOptions,
    ) -> DirectoryResult<Box<dyn DirectoryConnection>> {
        let mut settings = LdapConnSettings::new()
            .set_conn_timeout(options.timeout)
            .set_starttls(options.start_tls)
            .set_no_tls_verify(options.tls.skip_verify);

        if let Some(config) = tls_config(&options.tls)? {
            settings = settings.set_config(config);
        }

        debug!("Connecting to LDAP server: {}", url);

        let (conn, ldap) = LdapConnAsync::with_settings(settings, url)
            .await
            .map_err(directory_error)?;

        tokio::spawn(async move {
            if let Err(e) = conn.drive().await {
                warn!("LDAP connection error: {}", e);
            }
        });

        Ok(Box::new(Ldap3Connection {
            ldap,
            tls_upgraded: options.start_tls,
            timeout: options.timeout,
        }))
    }
}

pub struct Ldap3Connection {
    ldap: Ldap,
    tls_upgraded: bool,
    timeout: Duration,
}

#[async_trait]
impl DirectoryConnection for Ldap3Connection {
    async fn start_tls(&mut self) -> DirectoryResult<()> {
        if self.tls_upgraded {
            Ok(())
        } else {
            Err(DirectoryError::Unsupported(
                "STARTTLS must be requested when dialing".to_string(),
            ))
        }
    }

    async fn bind(&mut self, dn: &str, password: &str) -> DirectoryResult<()> {
        self.ldap
            .with_timeout(self.timeout)
            .simple_bind(dn, password)
            .await
            .map_err(directory_error)?
            .success()
            .map_err(directory_error)?;

        Ok(())
    }

    async fn search(&mut self, request: SearchRequest) -> DirectoryResult<Vec<Entry>> {
        let options = SearchOptions::new()
            .deref(deref_aliases(request.deref_aliases))
            .sizelimit(request.size_limit);

        let SearchResult(entries, result) = self
            .ldap
            .with_search_options(options)
            .with_timeout(self.timeout)
            .search(
                &request.base_dn,
                scope(request.scope),
                &request.filter,
                request.attributes,
            )
            .await
            .map_err(directory_error)?;

        // A size limit hit still carries the entries found so far.
        if result.rc != 0 && result.rc != DirectoryError::SIZE_LIMIT_EXCEEDED {
            return Err(DirectoryError::Result {
                code: result.rc,
                message: result.text,
            });
        }

        Ok(entries
            .into_iter()
            .filter(|e| !e.is_ref())
            .map(|e| entry_from(SearchEntry::construct(e)))
            .collect())
    }

    async fn modify(&mut self, dn: &str, changes: Vec<Modification>) -> DirectoryResult<()> {
        let mods: Vec<Mod<Vec<u8>>> = changes
            .into_iter()
            .map(|m| {
                Mod::Replace(
                    m.attribute.into_bytes(),
                    m.values.into_iter().collect::<HashSet<_>>(),
                )
            })
            .collect();

        self.ldap
            .with_timeout(self.timeout)
            .modify(dn, mods)
            .await
            .map_err(directory_error)?
            .success()
            .map_err(directory_error)?;

        Ok(())
    }

    async fn close(&mut self) -> DirectoryResult<()> {
        self.ldap.unbind().await.map_err(directory_error)
    }
}

/// Client TLS configuration for settings the stock `ldap3` setup can't express
fn tls_config(tls: &TlsOptions) -> DirectoryResult<Option<Arc<ClientConfig>>> {
    if tls.is_default() {
        return Ok(None);
    }

    let versions: &[&rustls::SupportedProtocolVersion] = match tls.minimum_version {
        TlsVersion::Tls12 => &[&rustls::version::TLS13, &rustls::version::TLS12],
        TlsVersion::Tls13 => &[&rustls::version::TLS13],
    };

    let verifier: Arc<dyn ServerCertVerifier> = if tls.skip_verify {
        Arc::new(AcceptAnyCertificate)
    } else {
        let server_name = tls
            .server_name
            .as_deref()
            .map(|name| {
                ServerName::try_from(name).map_err(|e| {
                    DirectoryError::Transport(format!("Invalid TLS server name {}: {}", name, e))
                })
            })
            .transpose()?;

        Arc::new(DirectoryCertVerifier {
            inner: WebPkiVerifier::new(root_store(tls.ca_file.as_deref())?, None),
            server_name,
        })
    };

    let config = ClientConfig::builder()
        .with_safe_default_cipher_suites()
        .with_safe_default_kx_groups()
        .with_protocol_versions(versions)
        .map_err(|e| DirectoryError::Transport(format!("TLS setup failed: {}", e)))?
        .with_custom_certificate_verifier(verifier)
        .with_no_client_auth();

    Ok(Some(Arc::new(config)))
}

/// System roots plus the certificates of `ca_file`
fn root_store(ca_file: Option<&str>) -> DirectoryResult<RootCertStore> {
    let mut store = RootCertStore::empty();

    match rustls_native_certs::load_native_certs() {
        Ok(certs) => {
            for cert in certs {
                if let Err(e) = store.add(&Certificate(cert.0)) {
                    debug!("Skipping system certificate: {}", e);
                }
            }
        }
        Err(e) => warn!("Failed to load system certificates: {}", e),
    }

    if let Some(path) = ca_file {
        let file = File::open(path).map_err(|e| {
            DirectoryError::Transport(format!("Failed to open CA file {}: {}", path, e))
        })?;
        let certs = rustls_pemfile::certs(&mut BufReader::new(file)).map_err(|e| {
            DirectoryError::Transport(format!("Failed to read CA file {}: {}", path, e))
        })?;

        let (added, _) = store.add_parsable_certificates(&certs);
        if added == 0 {
            return Err(DirectoryError::Transport(format!(
                "No certificates found in CA file {}",
                path
            )));
        }
        debug!("Loaded {} certificates from {}", added, path);
    }

    Ok(store)
}

/// Web PKI verification, optionally against a fixed server name
struct DirectoryCertVerifier {
    inner: WebPkiVerifier,
    server_name: Option<ServerName>,
}

impl ServerCertVerifier for DirectoryCertVerifier {
    fn verify_server_cert(
        &self,
        end_entity: &Certificate,
        intermediates: &[Certificate],
        server_name: &ServerName,
        scts: &mut dyn Iterator<Item = &[u8]>,
        ocsp_response: &[u8],
        now: SystemTime,
    ) -> Result<ServerCertVerified, rustls::Error> {
        self.inner.verify_server_cert(
            end_entity,
            intermediates,
            self.server_name.as_ref().unwrap_or(server_name),
            scts,
            ocsp_response,
            now,
        )
    }
}

struct AcceptAnyCertificate;

impl ServerCertVerifier for AcceptAnyCertificate {
    fn verify_server_cert(
        &self,
        _end_entity: &Certificate,
        _intermediates: &[Certificate],
        _server_name: &ServerName,
        _scts: &mut dyn Iterator<Item = &[u8]>,
        _ocsp_response: &[u8],
        _now: SystemTime,
    ) -> Result<ServerCertVerified, rustls::Error> {
        Ok(ServerCertVerified::assertion())
    }
}

fn directory_error(err: LdapError) -> DirectoryError {
    match err {
        LdapError::LdapResult { result } => DirectoryError::Result {
            code: result.rc,
            message: result.text,
        },
        other => DirectoryError::Transport(other.to_string()),
    }
}

fn scope(scope: SearchScope) -> Scope {
    match scope {
        SearchScope::Base => Scope::Base,
        SearchScope::OneLevel => Scope::OneLevel,
        SearchScope::Subtree => Scope::Subtree,
    }
}

fn deref_aliases(deref: DerefAliases) -> ldap3::DerefAliases {
    match deref {
        DerefAliases::Never => ldap3::DerefAliases::Never,
        DerefAliases::Searching => ldap3::DerefAliases::Searching,
        DerefAliases::Finding => ldap3::DerefAliases::Finding,
        DerefAliases::Always => ldap3::DerefAliases::Always,
    }
}

fn entry_from(entry: SearchEntry) -> Entry {
    let mut attributes: Vec<Attribute> = entry
        .attrs
        .into_iter()
        .map(|(name, values)| Attribute { name, values })
        .collect();

    attributes.extend(entry.bin_attrs.into_iter().map(|(name, values)| Attribute {
        name,
        values: values
            .iter()
            .map(|v| String::from_utf8_lossy(v).into_owned())
            .collect(),
    }));

    // ldap3 hands attributes over in a HashMap
    attributes.sort_by(|a, b| a.name.cmp(&b.name));

    Entry {
        dn: entry.dn,
        attributes,
    }
}
