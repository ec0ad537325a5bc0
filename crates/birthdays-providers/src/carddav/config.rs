//! CardDAV provider configuration.

use std::time::Duration;
use url::Url;

/// Configuration for the CardDAV provider.
#[derive(Clone)]
pub struct CardDavConfig {
    /// Address book collection URL.
    pub url: Url,

    /// Username for authentication.
    pub username: Option<String>,

    /// Password for authentication.
    pub password: Option<String>,

    /// Whether to verify TLS certificates.
    pub verify_tls: bool,

    /// Request timeout.
    pub timeout: Duration,

    /// User agent string.
    pub user_agent: String,
}

impl CardDavConfig {
    /// Default timeout in seconds.
    pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

    /// Creates a new CardDAV configuration for the given address book URL.
    ///
    /// # Errors
    ///
    /// Returns an error if the URL is invalid.
    pub fn new(url: impl AsRef<str>) -> Result<Self, url::ParseError> {
        let parsed = Url::parse(url.as_ref())?;
        Ok(Self {
            url: parsed,
            username: None,
            password: None,
            verify_tls: true,
            timeout: Duration::from_secs(Self::DEFAULT_TIMEOUT_SECS),
            user_agent: format!("carddav-birthdays/{}", env!("CARGO_PKG_VERSION")),
        })
    }

    /// Sets the credentials for authentication.
    pub fn with_credentials(
        mut self,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        self.username = Some(username.into());
        self.password = Some(password.into());
        self
    }

    /// Enables or disables TLS certificate verification.
    pub fn with_verify_tls(mut self, verify: bool) -> Self {
        self.verify_tls = verify;
        self
    }

    /// Sets the request timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Sets the user agent string.
    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    /// Returns the address book URL as a string.
    pub fn url_str(&self) -> &str {
        self.url.as_str()
    }

    /// Returns true if credentials are configured.
    pub fn has_credentials(&self) -> bool {
        self.username.is_some() && self.password.is_some()
    }
}

impl std::fmt::Debug for CardDavConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CardDavConfig")
            .field("url", &self.url.as_str())
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .field("verify_tls", &self.verify_tls)
            .field("timeout", &self.timeout)
            .field("user_agent", &self.user_agent)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = CardDavConfig::new("https://dav.example.com/addressbooks/alice/contacts/")
            .unwrap();
        assert_eq!(
            config.url_str(),
            "https://dav.example.com/addressbooks/alice/contacts/"
        );
        assert!(!config.has_credentials());
        assert!(config.verify_tls);
        assert_eq!(config.timeout, Duration::from_secs(30));
        assert!(config.user_agent.starts_with("carddav-birthdays/"));
    }

    #[test]
    fn builder_methods() {
        let config = CardDavConfig::new("https://dav.example.com/")
            .unwrap()
            .with_credentials("alice", "s3cret")
            .with_verify_tls(false)
            .with_timeout(Duration::from_secs(5));

        assert!(config.has_credentials());
        assert!(!config.verify_tls);
        assert_eq!(config.timeout, Duration::from_secs(5));
    }

    #[test]
    fn debug_redacts_password() {
        let config = CardDavConfig::new("https://dav.example.com/")
            .unwrap()
            .with_credentials("alice", "s3cret");
        let debug = format!("{:?}", config);
        assert!(debug.contains("alice"));
        assert!(!debug.contains("s3cret"));
    }

    #[test]
    fn invalid_url_returns_error() {
        assert!(CardDavConfig::new("dav.example.com/contacts").is_err());
    }
}
