//! The seam between the CA client and the network.
//!
//! The client only ever deals in [`HttpRequest`]/[`HttpResponse`] pairs and
//! hands them to a [`Transport`]. [`HttpTransport`] is the real one, built on
//! a blocking `reqwest` client; tests swap in an in-memory CA.

use crate::{
    ca::config::ClientConfig,
    error::{Error, Result},
};
use std::sync::Arc;
use std::time::Duration;
use tracing::trace;
use url::Url;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
    Put,
    Delete,
}

impl Method {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Post => "POST",
            Self::Put => "PUT",
            Self::Delete => "DELETE",
        }
    }
}

/// A single request to the CA.
#[derive(Debug, Clone, PartialEq, getset::Getters)]
#[getset(get = "pub")]
pub struct HttpRequest {
    method: Method,
    url: Url,
    headers: Vec<(String, String)>,
    body: Option<Vec<u8>>,
}

impl HttpRequest {
    pub fn get(url: Url) -> Self {
        Self {
            method: Method::Get,
            url,
            headers: Vec::new(),
            body: None,
        }
    }

    pub fn post(url: Url, body: Vec<u8>) -> Self {
        Self::with_body(Method::Post, url, body)
    }

    pub fn put(url: Url, body: Vec<u8>) -> Self {
        Self::with_body(Method::Put, url, body)
    }

    pub fn delete(url: Url) -> Self {
        Self {
            method: Method::Delete,
            url,
            headers: Vec::new(),
            body: None,
        }
    }

    fn with_body(method: Method, url: Url, body: Vec<u8>) -> Self {
        Self {
            method,
            url,
            headers: vec![("Content-Type".into(), "application/json".into())],
            body: Some(body),
        }
    }

    /// Add a header, consuming and returning the request.
    pub fn with_header<K: Into<String>, V: Into<String>>(mut self, name: K, value: V) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// Look up a header by (case-insensitive) name.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// `METHOD url`, for log lines and error messages.
    pub fn describe(&self) -> String {
        format!("{} {}", self.method.as_str(), self.url)
    }
}

/// What came back from the CA.
#[derive(Debug, Clone, PartialEq, getset::Getters)]
#[getset(get = "pub")]
pub struct HttpResponse {
    status: u16,
    /// `None` if the response had no body at all.
    body: Option<String>,
}

impl HttpResponse {
    pub fn new(status: u16, body: Option<String>) -> Self {
        Self { status, body }
    }
}

/// Sends one request and waits for its response. No retries, no pipelining.
pub trait Transport: Send + Sync {
    fn execute(&self, request: &HttpRequest) -> Result<HttpResponse>;
}

impl<T: Transport + ?Sized> Transport for Arc<T> {
    fn execute(&self, request: &HttpRequest) -> Result<HttpResponse> {
        (**self).execute(request)
    }
}

impl<T: Transport + ?Sized> Transport for Box<T> {
    fn execute(&self, request: &HttpRequest) -> Result<HttpResponse> {
        (**self).execute(request)
    }
}

/// HTTP(S) transport. The underlying client (and its connection pool) is
/// built once and shared by every request.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: reqwest::blocking::Client,
}

impl HttpTransport {
    pub fn new(config: &ClientConfig) -> Result<Self> {
        let mut builder =
            reqwest::blocking::Client::builder().danger_accept_invalid_hostnames(*config.tls().skip_hostname_verification());
        if let Some(pem) = config.tls().pem() {
            let certs = reqwest::Certificate::from_pem_bundle(pem.as_bytes())
                .map_err(|e| Error::InvalidArgument(format!("bad trusted certificate pem: {}", e)))?;
            for cert in certs {
                builder = builder.add_root_certificate(cert);
            }
        }
        if let Some(secs) = config.timeout_secs() {
            builder = builder.timeout(Duration::from_secs(*secs));
        }
        let client = builder.build().map_err(|e| Error::Transport(format!("building http client: {}", e)))?;
        Ok(Self { client })
    }
}

impl Transport for HttpTransport {
    fn execute(&self, request: &HttpRequest) -> Result<HttpResponse> {
        let mut builder = match request.method() {
            Method::Get => self.client.get(request.url().clone()),
            Method::Post => self.client.post(request.url().clone()),
            Method::Put => self.client.put(request.url().clone()),
            Method::Delete => self.client.delete(request.url().clone()),
        };
        for (name, value) in request.headers() {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if let Some(body) = request.body() {
            builder = builder.body(body.clone());
        }
        let res = builder
            .send()
            .map_err(|e| Error::Transport(format!("{}: {}", request.describe(), e)))?;
        let status = res.status().as_u16();
        let body = res
            .text()
            .map_err(|e| Error::Transport(format!("{}: reading body: {}", request.describe(), e)))?;
        trace!("{} -> {} {}", request.describe(), status, body);
        Ok(HttpResponse::new(status, if body.is_empty() { None } else { Some(body) }))
    }
}
