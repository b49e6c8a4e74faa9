//! Client configuration. A [`ClientConfig`] is built (or loaded) once by the
//! caller and handed to [`CaClient::new`](crate::ca::client::CaClient::new),
//! which validates it and builds the transport from it.

use crate::error::{Error, Result};
use serde_derive::{Deserialize, Serialize};
use url::Url;

/// Responses with a status at or above this are hard protocol errors.
pub const DEFAULT_STATUS_THRESHOLD: u16 = 400;

fn default_status_threshold() -> u16 {
    DEFAULT_STATUS_THRESHOLD
}

/// TLS options for talking to the CA.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, getset::Getters, getset::Setters)]
#[getset(get = "pub", set = "pub")]
pub struct TlsConfig {
    /// PEM-encoded certificate(s) to trust in addition to the system roots.
    #[serde(default)]
    pem: Option<String>,
    /// Accept server certificates whose names don't match the host we
    /// connected to. Only for test networks.
    #[serde(default)]
    skip_hostname_verification: bool,
}

impl TlsConfig {
    pub fn new(pem: Option<String>, skip_hostname_verification: bool) -> Self {
        Self {
            pem,
            skip_hostname_verification,
        }
    }
}

/// Everything needed to talk to one CA.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, getset::Getters, getset::Setters)]
#[getset(get = "pub", set = "pub")]
pub struct ClientConfig {
    /// The CA's base URL, ie `https://ca.example.com:7054`. No path, no query.
    url: String,
    /// The name of the CA to address on servers hosting more than one.
    #[serde(default)]
    ca_name: Option<String>,
    /// See [`DEFAULT_STATUS_THRESHOLD`].
    #[serde(default = "default_status_threshold")]
    status_threshold: u16,
    #[serde(default)]
    tls: TlsConfig,
    /// Overall per-request timeout. `None` leaves it up to the HTTP client.
    #[serde(default)]
    timeout_secs: Option<u64>,
}

impl ClientConfig {
    /// Create a config with default TLS options and threshold.
    pub fn new<T: Into<String>>(url: T, ca_name: Option<String>) -> Self {
        Self {
            url: url.into(),
            ca_name,
            status_threshold: DEFAULT_STATUS_THRESHOLD,
            tls: TlsConfig::default(),
            timeout_secs: None,
        }
    }

    /// Load a config from YAML.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        Ok(serde_yaml::from_str(yaml)?)
    }

    /// Check this config for problems, returning the parsed base URL if there
    /// are none.
    pub fn validate(&self) -> Result<Url> {
        let url = Url::parse(&self.url)?;
        match url.scheme() {
            "http" | "https" => {}
            other => Err(Error::InvalidArgument(format!("invalid protocol {:?}, must be http or https", other)))?,
        }
        if url.host_str().map(|h| h.is_empty()).unwrap_or(true) {
            Err(Error::InvalidArgument(format!("url {} must have a host", self.url)))?;
        }
        if !matches!(url.path(), "" | "/") {
            Err(Error::InvalidArgument(format!("url {} must not include a path", self.url)))?;
        }
        if url.query().is_some() {
            Err(Error::InvalidArgument(format!("url {} must not include a query", self.url)))?;
        }
        if matches!(self.ca_name.as_deref(), Some("")) {
            Err(Error::InvalidArgument("ca name must not be an empty string".into()))?;
        }
        Ok(url)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_validate() {
        let url = ClientConfig::new("https://ca.example.com:7054", None).validate().unwrap();
        assert_eq!(url.host_str(), Some("ca.example.com"));
        assert_eq!(url.port(), Some(7054));
        ClientConfig::new("http://localhost:7054/", Some("ca-org1".into())).validate().unwrap();

        let bad = [
            "ftp://ca.example.com",
            "https://ca.example.com/api",
            "https://ca.example.com?x=1",
            "file:///etc/hosts",
        ];
        for url in bad {
            let res = ClientConfig::new(url, None).validate();
            assert!(matches!(res, Err(Error::InvalidArgument(_))), "{}", url);
        }
        assert!(matches!(ClientConfig::new("not a url", None).validate(), Err(Error::Url(_))));
        let res = ClientConfig::new("https://ca.example.com", Some("".into())).validate();
        assert!(matches!(res, Err(Error::InvalidArgument(_))));
    }

    #[test]
    fn config_from_yaml() {
        let config = ClientConfig::from_yaml(
            r#"
url: "https://ca.org1.example.com:7054"
ca_name: ca-org1
tls:
  skip_hostname_verification: true
"#,
        )
        .unwrap();
        assert_eq!(config.url(), "https://ca.org1.example.com:7054");
        assert_eq!(config.ca_name().as_deref(), Some("ca-org1"));
        assert_eq!(config.status_threshold(), &DEFAULT_STATUS_THRESHOLD);
        assert!(*config.tls().skip_hostname_verification());
        assert_eq!(config.tls().pem(), &None);
        assert_eq!(config.timeout_secs(), &None);

        let config = ClientConfig::from_yaml("url: http://localhost:7054\nstatus_threshold: 500\ntimeout_secs: 30\n").unwrap();
        assert_eq!(config.status_threshold(), &500);
        assert_eq!(config.timeout_secs(), &Some(30));

        assert!(matches!(ClientConfig::from_yaml("ca_name: [1, 2"), Err(Error::Yaml(_))));
    }
}
