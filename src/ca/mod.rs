//! Everything needed to talk to a certificate authority: registering and
//! enrolling identities, revoking certificates, and pulling CRLs and
//! identity/affiliation listings.
//!
//! The [`client::CaClient`] does the talking. Everything else in here is
//! plumbing it is built from: config, transport, response classification,
//! auth tokens, and the request/response values.

pub mod auth;
pub mod client;
pub mod config;
pub mod identity;
pub mod request;
pub mod response;
pub mod transport;

use crate::{
    crypto::key::EnrollmentKey,
    error::{Error, Result},
};
use x509_parser::prelude::*;

/// Every endpoint hangs off this.
pub const CONTEXT_ROOT: &str = "/api/v1/";
pub const ENDPOINT_ENROLL: &str = "enroll";
pub const ENDPOINT_REGISTER: &str = "register";
pub const ENDPOINT_REENROLL: &str = "reenroll";
pub const ENDPOINT_REVOKE: &str = "revoke";
pub const ENDPOINT_GENCRL: &str = "gencrl";
pub const ENDPOINT_INFO: &str = "cainfo";
pub const ENDPOINT_IDENTITIES: &str = "identities";
pub const ENDPOINT_AFFILIATIONS: &str = "affiliations";

/// The body key carrying the CA name on POSTs.
pub const PARAM_CA_NAME_BODY: &str = "caname";
/// The query key carrying the CA name on GETs and DELETEs.
pub const PARAM_CA_NAME_QUERY: &str = "ca";
/// Lets an affiliation change cascade to what's under it.
pub const PARAM_FORCE: &str = "force";

pub const IDENTITY_TYPE_PEER: &str = "peer";
pub const IDENTITY_TYPE_ORDERER: &str = "orderer";
pub const IDENTITY_TYPE_CLIENT: &str = "client";
pub const IDENTITY_TYPE_USER: &str = "user";

pub const ATTR_REGISTRAR_ROLES: &str = "hf.Registrar.Roles";
pub const ATTR_REGISTRAR_DELEGATE_ROLES: &str = "hf.Registrar.DelegateRoles";
pub const ATTR_REGISTRAR_ATTRIBUTES: &str = "hf.Registrar.Attributes";
pub const ATTR_INTERMEDIATE_CA: &str = "hf.IntermediateCA";
pub const ATTR_REVOKER: &str = "hf.Revoker";
pub const ATTR_AFFILIATION_MGR: &str = "hf.AffiliationMgr";
pub const ATTR_GEN_CRL: &str = "hf.GenCRL";

/// A certificate issued by the CA plus the key it was issued for.
///
/// Enrollments belong to the caller. The client never holds on to one past
/// the call it was passed into.
#[derive(Debug, Clone, PartialEq, getset::Getters)]
#[getset(get = "pub")]
pub struct Enrollment {
    key: EnrollmentKey,
    /// PEM-encoded X.509 certificate
    cert: String,
}

impl Enrollment {
    pub fn new<T: Into<String>>(key: EnrollmentKey, cert: T) -> Self {
        Self { key, cert: cert.into() }
    }

    /// Build the certificate-based auth token for a request body.
    pub fn auth_token(&self, body: &[u8]) -> Result<String> {
        auth::auth_token(&self.cert, &self.key, body)
    }

    fn with_certificate<T, F>(&self, op: F) -> Result<T>
    where
        F: FnOnce(&X509Certificate<'_>) -> Result<T>,
    {
        let (_, pem) = parse_x509_pem(self.cert.as_bytes())
            .map_err(|e| Error::InvalidArgument(format!("enrollment certificate is not pem: {}", e)))?;
        let cert = pem
            .parse_x509()
            .map_err(|e| Error::InvalidArgument(format!("enrollment certificate is not x509: {}", e)))?;
        op(&cert)
    }

    /// The certificate's subject common name.
    pub fn common_name(&self) -> Result<String> {
        self.with_certificate(|cert| {
            cert.subject()
                .iter_common_name()
                .next()
                .and_then(|cn| cn.as_str().ok())
                .map(String::from)
                .ok_or_else(|| Error::InvalidArgument("enrollment certificate has no common name".into()))
        })
    }

    /// The certificate's serial number as upper-case hex.
    pub fn serial_hex(&self) -> Result<String> {
        self.with_certificate(|cert| Ok(hex::encode_upper(cert.raw_serial())))
    }

    /// The certificate's authority key identifier as upper-case hex.
    pub fn aki_hex(&self) -> Result<String> {
        self.with_certificate(|cert| {
            cert.extensions()
                .iter()
                .find_map(|ext| match ext.parsed_extension() {
                    ParsedExtension::AuthorityKeyIdentifier(aki) => aki.key_identifier.as_ref().map(|id| hex::encode_upper(id.0)),
                    _ => None,
                })
                .ok_or_else(|| Error::InvalidArgument("enrollment certificate has no authority key identifier".into()))
        })
    }
}
