//! Configuration for directory lookups.
//!
//! Settings start from fixed defaults and are overlaid by an optional INI file, by default
//! `~/.mutt-ldap.rc`:
//!
//! ```ini
//! [connection]
//! server = myserver.example.net
//! basedn = ou=people,dc=example,dc=net
//!
//! [auth]
//! gssapi = yes
//! ```
//!
//! Unknown sections and keys are ignored; malformed syntax and unparsable values fail with
//! [`Error::ConfigError`].

use crate::{Error, Result};
use ini::{Ini, ParseOption};
use secrecy::SecretString;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::debug;

/// File name of the per-user configuration, relative to the home directory.
pub const CONFIG_FILE_NAME: &str = ".mutt-ldap.rc";
/// Default connection and operation timeout (seconds).
pub const DEFAULT_TIMEOUT_SECS: u64 = 10;

/// Settings from the `[connection]` section.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionSettings {
    /// Directory server host name
    pub server: String,

    /// Directory server port (636 is the usual choice with `ssl`)
    pub port: u16,

    /// Connect with `ldaps://` instead of `ldap://`
    pub ssl: bool,

    /// Upgrade a plain `ldap://` connection with StartTLS before binding
    pub starttls: bool,

    /// Base DN under which searches are scoped
    pub basedn: String,

    /// Whether to verify the server's TLS certificate
    pub tls_verify: bool,

    /// Optional PEM file with an extra trusted root certificate
    pub ca_cert: Option<PathBuf>,

    /// Connect and per-operation timeout in seconds
    pub timeout_secs: u64,
}

impl Default for ConnectionSettings {
    fn default() -> Self {
        Self {
            server: "domaincontroller.yourdomain.com".to_string(),
            port: 389,
            ssl: false,
            starttls: false,
            basedn: "ou=x co.,dc=example,dc=net".to_string(),
            tls_verify: true,
            ca_cert: None,
            timeout_secs: DEFAULT_TIMEOUT_SECS,
        }
    }
}

impl ConnectionSettings {
    /// Returns the timeout as a Duration.
    #[must_use]
    pub const fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Settings from the `[auth]` section.
#[derive(Debug)]
pub struct AuthSettings {
    /// Bind DN for a simple bind (empty for anonymous)
    pub user: String,

    /// Password for a simple bind (empty for anonymous)
    pub password: SecretString,

    /// Bind with SASL GSSAPI using ambient Kerberos credentials.
    ///
    /// Only binaries built with the `gssapi` feature can do this; other builds fail the bind
    /// with an auth error.
    pub gssapi: bool,
}

impl Default for AuthSettings {
    fn default() -> Self {
        Self {
            user: String::new(),
            password: SecretString::from(String::new()),
            gssapi: false,
        }
    }
}

/// Complete, immutable configuration for one invocation.
#[derive(Debug, Default)]
pub struct Configuration {
    /// `[connection]` settings
    pub connection: ConnectionSettings,
    /// `[auth]` settings
    pub auth: AuthSettings,
}

impl Configuration {
    /// Location of the per-user configuration file, if a home directory is known.
    #[must_use]
    pub fn default_path() -> Option<PathBuf> {
        dirs::home_dir().map(|home| home.join(CONFIG_FILE_NAME))
    }

    /// Loads the configuration from the default per-user file.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ConfigError`] if the file exists but cannot be read or parsed.
    pub fn load() -> Result<Self> {
        match Self::default_path() {
            Some(path) => Self::load_from(path),
            None => {
                debug!("no home directory, using built-in defaults");
                Ok(Self::default())
            }
        }
    }

    /// Loads the defaults overlaid by the file at `path`.
    ///
    /// A missing file yields the defaults.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ConfigError`] if the file exists but cannot be read or parsed.
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        match fs::read_to_string(path) {
            Ok(text) => {
                debug!(path = %path.display(), "loading configuration");
                Self::from_ini_str(&text).map_err(|err| match err {
                    Error::ConfigError(message) => {
                        Error::ConfigError(format!("{}: {message}", path.display()))
                    }
                    other => other,
                })
            }
            Err(err) if err.kind() == ErrorKind::NotFound => {
                debug!(path = %path.display(), "no configuration file, using built-in defaults");
                Ok(Self::default())
            }
            Err(err) => Err(Error::ConfigError(format!(
                "failed to read {}: {err}",
                path.display()
            ))),
        }
    }

    /// Builds a configuration from INI text overlaid on the defaults.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ConfigError`] on malformed syntax, a key outside any section, or a
    /// value that does not parse for its key.
    pub fn from_ini_str(text: &str) -> Result<Self> {
        let options = ParseOption {
            enabled_quote: false,
            enabled_escape: false,
            ..ParseOption::default()
        };
        let ini = Ini::load_from_str_opt(text, options)?;

        let mut config = Self::default();
        for (section, properties) in ini.iter() {
            for (key, value) in properties.iter() {
                let key = key.to_ascii_lowercase();
                match section {
                    Some("connection") => config.apply_connection(&key, value)?,
                    Some("auth") => config.apply_auth(&key, value)?,
                    Some(other) => debug!(section = other, key = %key, "ignoring unknown section"),
                    None => {
                        return Err(Error::ConfigError(format!(
                            "key `{key}` appears before any section header"
                        )))
                    }
                }
            }
        }
        Ok(config)
    }

    fn apply_connection(&mut self, key: &str, value: &str) -> Result<()> {
        let connection = &mut self.connection;
        match key {
            "server" => connection.server = value.to_string(),
            "port" => {
                connection.port = value.parse::<u16>().map_err(|_| {
                    Error::ConfigError(format!("connection.port: invalid port `{value}`"))
                })?;
            }
            "ssl" => connection.ssl = boolean_setting("connection", key, value)?,
            "starttls" => connection.starttls = boolean_setting("connection", key, value)?,
            "basedn" => connection.basedn = value.to_string(),
            "tls_verify" => connection.tls_verify = boolean_setting("connection", key, value)?,
            "ca_cert" => {
                connection.ca_cert = (!value.is_empty()).then(|| PathBuf::from(value));
            }
            "timeout" => {
                connection.timeout_secs = value
                    .parse::<u64>()
                    .ok()
                    .filter(|secs| *secs > 0)
                    .ok_or_else(|| {
                        Error::ConfigError(format!(
                            "connection.timeout: expected a positive number of seconds, got `{value}`"
                        ))
                    })?;
            }
            _ => debug!(key, "ignoring unknown key in [connection]"),
        }
        Ok(())
    }

    fn apply_auth(&mut self, key: &str, value: &str) -> Result<()> {
        match key {
            "user" => self.auth.user = value.to_string(),
            "password" => self.auth.password = SecretString::from(value.to_string()),
            "gssapi" => self.auth.gssapi = boolean_setting("auth", key, value)?,
            _ => debug!(key, "ignoring unknown key in [auth]"),
        }
        Ok(())
    }
}

/// Parses the tolerant boolean grammar used in the configuration file.
///
/// Accepts `1`, `yes`, `true`, `on` and `0`, `no`, `false`, `off`, ignoring ASCII case.
#[must_use]
pub fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "yes" | "true" | "on" => Some(true),
        "0" | "no" | "false" | "off" => Some(false),
        _ => None,
    }
}

fn boolean_setting(section: &str, key: &str, value: &str) -> Result<bool> {
    parse_bool(value).ok_or_else(|| {
        Error::ConfigError(format!("{section}.{key}: not a boolean: `{value}`"))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::ExposeSecret;

    #[test]
    fn defaults_are_complete() {
        let config = Configuration::default();
        assert_eq!(config.connection.server, "domaincontroller.yourdomain.com");
        assert_eq!(config.connection.port, 389);
        assert!(!config.connection.ssl);
        assert!(!config.connection.starttls);
        assert_eq!(config.connection.basedn, "ou=x co.,dc=example,dc=net");
        assert!(config.connection.tls_verify);
        assert!(config.connection.ca_cert.is_none());
        assert_eq!(config.connection.timeout(), Duration::from_secs(10));
        assert_eq!(config.auth.user, "");
        assert_eq!(config.auth.password.expose_secret(), "");
        assert!(!config.auth.gssapi);
    }

    #[test]
    fn overlay_keeps_unspecified_defaults() {
        let config = Configuration::from_ini_str(
            "[connection]\nserver = myserver.example.net\nbasedn = ou=people,dc=example,dc=net\n",
        )
        .unwrap();

        assert_eq!(config.connection.server, "myserver.example.net");
        assert_eq!(config.connection.basedn, "ou=people,dc=example,dc=net");
        assert_eq!(config.connection.port, 389);
        assert!(!config.auth.gssapi);
    }

    #[test]
    fn overlay_all_keys() {
        let config = Configuration::from_ini_str(
            "# site settings\n\
             [connection]\n\
             server = ldap.example.org\n\
             port: 636\n\
             ssl = Yes\n\
             starttls = on\n\
             tls_verify = false\n\
             ca_cert = /etc/ssl/ldap-ca.pem\n\
             timeout = 3\n\
             [auth]\n\
             user = cn=reader,dc=example,dc=org\n\
             password = s3cr\\et\"\n\
             gssapi = 0\n",
        )
        .unwrap();

        assert_eq!(config.connection.server, "ldap.example.org");
        assert_eq!(config.connection.port, 636);
        assert!(config.connection.ssl);
        assert!(config.connection.starttls);
        assert!(!config.connection.tls_verify);
        assert_eq!(
            config.connection.ca_cert.as_deref(),
            Some(Path::new("/etc/ssl/ldap-ca.pem"))
        );
        assert_eq!(config.connection.timeout_secs, 3);
        assert_eq!(config.auth.user, "cn=reader,dc=example,dc=org");
        assert_eq!(config.auth.password.expose_secret(), "s3cr\\et\"");
        assert!(!config.auth.gssapi);
    }

    #[test]
    fn keys_are_case_insensitive() {
        let config = Configuration::from_ini_str("[auth]\nGSSAPI = TRUE\n").unwrap();
        assert!(config.auth.gssapi);
    }

    #[test]
    fn unknown_sections_and_keys_are_ignored() {
        let config = Configuration::from_ini_str(
            "[connection]\nfavourite_colour = blue\n[extras]\nanything = goes\n",
        )
        .unwrap();
        assert_eq!(config.connection, ConnectionSettings::default());
    }

    #[test]
    fn malformed_syntax_is_rejected() {
        let err = Configuration::from_ini_str("[connection]\nthis line has no separator\n")
            .unwrap_err();
        assert!(matches!(err, Error::ConfigError(_)));
    }

    #[test]
    fn key_before_section_is_rejected() {
        let err = Configuration::from_ini_str("server = x\n[connection]\n").unwrap_err();
        assert!(matches!(err, Error::ConfigError(message) if message.contains("server")));
    }

    #[test]
    fn invalid_boolean_names_the_key() {
        let err = Configuration::from_ini_str("[connection]\nssl = maybe\n").unwrap_err();
        assert_eq!(
            err,
            Error::ConfigError("connection.ssl: not a boolean: `maybe`".to_string())
        );
    }

    #[test]
    fn invalid_port_and_timeout_are_rejected() {
        assert!(Configuration::from_ini_str("[connection]\nport = ldap\n").is_err());
        assert!(Configuration::from_ini_str("[connection]\nport = 70000\n").is_err());
        assert!(Configuration::from_ini_str("[connection]\ntimeout = 0\n").is_err());
    }

    #[test]
    fn empty_ca_cert_means_unset() {
        let config = Configuration::from_ini_str("[connection]\nca_cert =\n").unwrap();
        assert!(config.connection.ca_cert.is_none());
    }

    #[test]
    fn boolean_grammar() {
        for value in ["1", "yes", "TRUE", "On"] {
            assert_eq!(parse_bool(value), Some(true), "{value}");
        }
        for value in ["0", "No", "false", "OFF"] {
            assert_eq!(parse_bool(value), Some(false), "{value}");
        }
        assert_eq!(parse_bool("y"), None);
        assert_eq!(parse_bool(""), None);
    }

    #[test]
    fn missing_file_yields_defaults() {
        let path = std::env::temp_dir().join(format!(
            "mutt-ldap-missing-{}.rc",
            std::process::id()
        ));
        let config = Configuration::load_from(&path).unwrap();
        assert_eq!(config.connection, ConnectionSettings::default());
    }

    #[test]
    fn load_from_file_reports_path_on_error() {
        let path = std::env::temp_dir().join(format!(
            "mutt-ldap-broken-{}.rc",
            std::process::id()
        ));
        fs::write(&path, "[auth]\ngssapi = perhaps\n").unwrap();
        let result = Configuration::load_from(&path);
        fs::remove_file(&path).unwrap();

        let err = result.unwrap_err();
        assert!(err.to_string().contains(&path.display().to_string()));
    }

    #[test]
    fn password_is_redacted_in_debug_output() {
        let config = Configuration::from_ini_str("[auth]\npassword = hunter2\n").unwrap();
        assert!(!format!("{config:?}").contains("hunter2"));
    }
}
