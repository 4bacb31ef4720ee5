//! Directory client: connecting, binding and searching over LDAP.

use crate::{entry::DirectoryEntry, Result};
use async_trait::async_trait;
use ldap3::{LdapConnAsync, LdapConnSettings, Scope, SearchEntry};
use mutt_ldap_core::config::ConnectionSettings;
use mutt_ldap_core::{Configuration, Error};
use native_tls::{Certificate, TlsConnector};
use secrecy::ExposeSecret;
use std::fs;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::timeout;
use tracing::{debug, warn};
use url::Url;

/// Attributes matched by the substring search, in filter order.
const SEARCH_ATTRIBUTES: [&str; 3] = ["cn", "uid", "mail"];

/// Where to open a directory session and whether to upgrade it with StartTLS.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    /// `ldap://host:port` or `ldaps://host:port`.
    pub url: String,
    /// Server host name, also used as the GSSAPI service host.
    pub server: String,
    /// Upgrade the plain connection with StartTLS before binding.
    pub starttls: bool,
}

/// Builds the server URL: `ldaps` when `ssl` is set, `ldap` otherwise.
///
/// # Errors
///
/// Returns [`Error::ConfigError`] if host and port do not form a valid URL.
pub fn connection_url(settings: &ConnectionSettings) -> Result<String> {
    let scheme = if settings.ssl { "ldaps" } else { "ldap" };
    let url = format!("{scheme}://{}:{}", settings.server, settings.port);
    Url::parse(&url)?;
    Ok(url)
}

/// Builds the substring filter for `query` across `cn`, `uid` and `mail`.
///
/// The query is used verbatim. An empty query matches every entry that has one of the
/// attributes.
#[must_use]
pub fn search_filter(query: &str) -> String {
    let post = if query.is_empty() { "" } else { "*" };
    let terms: String = SEARCH_ATTRIBUTES
        .iter()
        .map(|attribute| format!("({attribute}=*{query}{post})"))
        .collect();
    format!("(|{terms})")
}

/// An open session with the directory server.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait DirectorySession: Send {
    /// Binds with a DN and password; empty strings bind anonymously.
    async fn simple_bind(&mut self, dn: &str, password: &str) -> Result<()>;

    /// Binds with SASL GSSAPI using the ambient Kerberos credentials.
    async fn gssapi_bind(&mut self, server_fqdn: &str) -> Result<()>;

    /// Searches the whole subtree under `base_dn`, returning every attribute of the matching
    /// entries.
    async fn search(&mut self, base_dn: &str, filter: &str) -> Result<Vec<DirectoryEntry>>;

    /// Closes the session.
    async fn unbind(&mut self) -> Result<()>;
}

/// Opens unauthenticated sessions.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait DirectoryConnector: Send + Sync {
    /// Opens a session against `endpoint`, upgrading it with StartTLS if requested.
    async fn open(&self, endpoint: &Endpoint) -> Result<Box<dyn DirectorySession>>;
}

/// Directory client with pluggable LDAP backend.
pub struct DirectoryClient {
    config: Arc<Configuration>,
    connector: Box<dyn DirectoryConnector>,
}

impl DirectoryClient {
    /// Creates a client that uses the real LDAP connector.
    #[must_use]
    pub fn new(config: Configuration) -> Self {
        let config = Arc::new(config);
        let connector: Box<dyn DirectoryConnector> = Box::new(LdapConnector::new(config.clone()));
        Self { config, connector }
    }

    /// Creates a client that opens sessions through `connector`.
    #[must_use]
    pub fn with_connector(config: Configuration, connector: Box<dyn DirectoryConnector>) -> Self {
        Self {
            config: Arc::new(config),
            connector,
        }
    }

    /// Resolves the endpoint for the configured connection.
    ///
    /// StartTLS is only requested for plain `ldap://`; an `ldaps://` channel is already
    /// encrypted.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ConfigError`] if the server URL is invalid.
    pub fn endpoint(&self) -> Result<Endpoint> {
        let connection = &self.config.connection;
        let url = connection_url(connection)?;
        if connection.starttls && connection.ssl {
            debug!("connection already uses ldaps, skipping StartTLS");
        }
        Ok(Endpoint {
            url,
            server: connection.server.clone(),
            starttls: connection.starttls && !connection.ssl,
        })
    }

    /// Opens and authenticates a session.
    ///
    /// The caller owns the returned session and must unbind it. If the bind fails the session
    /// is closed here before the error is returned.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ConnectionError`] or [`Error::Timeout`] if the server cannot be reached
    /// and [`Error::AuthError`] if the bind is rejected.
    pub async fn connect(&self) -> Result<Box<dyn DirectorySession>> {
        let endpoint = self.endpoint()?;
        debug!(url = %endpoint.url, starttls = endpoint.starttls, "connecting to directory");
        let mut session = self.connector.open(&endpoint).await?;

        if let Err(err) = self.bind(session.as_mut(), &endpoint).await {
            if let Err(close_err) = session.unbind().await {
                warn!(error = %close_err, "failed to close session after bind error");
            }
            return Err(err);
        }
        Ok(session)
    }

    /// Searches for `query` in `cn`, `uid` and `mail` below the configured base DN.
    ///
    /// When `session` is `None` a session is opened for this call and closed again whether or
    /// not the search succeeds. A supplied session is left open.
    ///
    /// # Errors
    ///
    /// Returns connection and bind errors from [`Self::connect`], and
    /// [`Error::SearchError`] if the search fails.
    pub async fn search(
        &self,
        query: &str,
        session: Option<&mut dyn DirectorySession>,
    ) -> Result<Vec<DirectoryEntry>> {
        let mut scoped = match session {
            Some(session) => ScopedSession::Borrowed(session),
            None => ScopedSession::Owned(self.connect().await?),
        };

        let base_dn = self.config.connection.basedn.as_str();
        let filter = search_filter(query);
        debug!(base_dn, filter = %filter, "searching directory");
        let outcome = scoped.session().search(base_dn, &filter).await;

        let entries = scoped.release(outcome).await?;
        debug!(count = entries.len(), "search finished");
        Ok(entries)
    }

    async fn bind(&self, session: &mut dyn DirectorySession, endpoint: &Endpoint) -> Result<()> {
        let auth = &self.config.auth;
        if auth.gssapi {
            debug!(server = %endpoint.server, "binding with SASL GSSAPI");
            session.gssapi_bind(&endpoint.server).await
        } else {
            if auth.user.is_empty() {
                debug!("binding anonymously");
            } else {
                debug!(user = %auth.user, "binding with password");
            }
            session
                .simple_bind(&auth.user, auth.password.expose_secret())
                .await
        }
    }
}

/// A session held for the duration of one search, closed on release only if it was opened
/// for that search.
enum ScopedSession<'a> {
    Borrowed(&'a mut dyn DirectorySession),
    Owned(Box<dyn DirectorySession>),
}

impl ScopedSession<'_> {
    fn session(&mut self) -> &mut dyn DirectorySession {
        match self {
            Self::Borrowed(session) => &mut **session,
            Self::Owned(session) => session.as_mut(),
        }
    }

    /// Closes an owned session and returns `outcome`. A close failure only surfaces when the
    /// outcome itself was a success.
    async fn release<T>(self, outcome: Result<T>) -> Result<T> {
        let Self::Owned(mut session) = self else {
            return outcome;
        };

        match (outcome, session.unbind().await) {
            (Ok(value), Ok(())) => Ok(value),
            (Ok(_), Err(close_err)) => Err(close_err),
            (Err(err), Ok(())) => Err(err),
            (Err(err), Err(close_err)) => {
                warn!(error = %close_err, "failed to close session after search error");
                Err(err)
            }
        }
    }
}

/// Real LDAP connector backed by `ldap3`.
pub struct LdapConnector {
    config: Arc<Configuration>,
}

impl LdapConnector {
    /// Creates a new connector instance.
    #[must_use]
    pub fn new(config: Arc<Configuration>) -> Self {
        Self { config }
    }
}

#[async_trait]
impl DirectoryConnector for LdapConnector {
    async fn open(&self, endpoint: &Endpoint) -> Result<Box<dyn DirectorySession>> {
        let connection = &self.config.connection;
        let settings = build_ldap_settings(connection)?.set_starttls(endpoint.starttls);
        let (conn, ldap) = LdapConnAsync::with_settings(settings, &endpoint.url)
            .await
            .map_err(|err| Error::ConnectionError(format!("{}: {err}", endpoint.url)))?;

        tokio::spawn(async move {
            if let Err(err) = conn.drive().await {
                warn!(error = %err, "LDAP connection driver error");
            }
        });

        Ok(Box::new(LdapSession {
            inner: ldap,
            operation_timeout: connection.timeout(),
        }))
    }
}

struct LdapSession {
    inner: ldap3::Ldap,
    operation_timeout: Duration,
}

#[async_trait]
impl DirectorySession for LdapSession {
    async fn simple_bind(&mut self, dn: &str, password: &str) -> Result<()> {
        timeout(self.operation_timeout, self.inner.simple_bind(dn, password))
            .await
            .map_err(|_| Error::Timeout("bind timed out".to_string()))?
            .map_err(|err| Error::ConnectionError(err.to_string()))?
            .success()
            .map_err(|err| Error::AuthError(err.to_string()))?;
        Ok(())
    }

    async fn gssapi_bind(&mut self, server_fqdn: &str) -> Result<()> {
        timeout(
            self.operation_timeout,
            sasl_gssapi_bind(&mut self.inner, server_fqdn),
        )
        .await
        .map_err(|_| Error::Timeout("GSSAPI bind timed out".to_string()))?
    }

    async fn search(&mut self, base_dn: &str, filter: &str) -> Result<Vec<DirectoryEntry>> {
        let (entries, _) = timeout(
            self.operation_timeout,
            self.inner.search(base_dn, Scope::Subtree, filter, Vec::<&str>::new()),
        )
        .await
        .map_err(|_| Error::Timeout("search timed out".to_string()))?
        .map_err(map_search_error)?
        .success()
        .map_err(map_search_error)?;

        Ok(entries
            .into_iter()
            .map(SearchEntry::construct)
            .map(DirectoryEntry::from)
            .collect())
    }

    async fn unbind(&mut self) -> Result<()> {
        timeout(self.operation_timeout, self.inner.unbind())
            .await
            .map_err(|_| Error::Timeout("unbind timed out".to_string()))?
            .map_err(|err| Error::ConnectionError(format!("unbind failed: {err}")))
    }
}

#[cfg(feature = "gssapi")]
async fn sasl_gssapi_bind(ldap: &mut ldap3::Ldap, server_fqdn: &str) -> Result<()> {
    ldap.sasl_gssapi_bind(server_fqdn)
        .await
        .map_err(|err| Error::ConnectionError(err.to_string()))?
        .success()
        .map_err(|err| Error::AuthError(err.to_string()))?;
    Ok(())
}

#[cfg(not(feature = "gssapi"))]
async fn sasl_gssapi_bind(_ldap: &mut ldap3::Ldap, _server_fqdn: &str) -> Result<()> {
    Err(Error::AuthError(
        "GSSAPI bind requested but mutt-ldap was built without the `gssapi` feature".to_string(),
    ))
}

fn build_ldap_settings(connection: &ConnectionSettings) -> Result<LdapConnSettings> {
    let mut settings = LdapConnSettings::new().set_conn_timeout(connection.timeout());

    if !connection.tls_verify {
        let connector = TlsConnector::builder()
            .danger_accept_invalid_certs(true)
            .build()
            .map_err(|err| {
                Error::ConfigError(format!("failed to construct TLS connector: {err}"))
            })?;
        settings = settings.set_connector(connector).set_no_tls_verify(true);
    } else if let Some(cert_path) = &connection.ca_cert {
        let pem = fs::read(cert_path).map_err(|err| {
            Error::ConfigError(format!(
                "failed to read CA certificate {}: {err}",
                cert_path.display()
            ))
        })?;
        let certificate = Certificate::from_pem(&pem)
            .map_err(|err| Error::ConfigError(format!("invalid CA certificate: {err}")))?;
        let connector = TlsConnector::builder()
            .add_root_certificate(certificate)
            .build()
            .map_err(|err| Error::ConfigError(format!("failed to load CA certificate: {err}")))?;
        settings = settings.set_connector(connector);
    }

    Ok(settings)
}

fn map_search_error(err: ldap3::LdapError) -> Error {
    Error::SearchError(err.to_string())
}
