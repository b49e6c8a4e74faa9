//! Authorization header values for CA requests.
//!
//! Certificate-based calls carry a token of the form
//! `base64(cert).base64(signature)`, where the signature covers
//! `base64(body).base64(cert)`. The one call made before an identity has a
//! certificate (enroll) uses HTTP Basic instead.

use crate::{
    crypto::key::Signer,
    error::{Error, Result},
    util::ser,
};
use tracing::error;

/// Build the auth token for a request body, signed by the holder of
/// `cert_pem`.
pub fn auth_token<S: Signer + ?Sized>(cert_pem: &str, signer: &S, body: &[u8]) -> Result<String> {
    let cert_b64 = ser::base64_encode(cert_pem.as_bytes());
    let body_b64 = ser::base64_encode(body);
    let signed = format!("{}.{}", body_b64, cert_b64);
    let sig = signer.sign(signed.as_bytes()).map_err(|e| {
        error!("failed to sign auth token: {}", e);
        match e {
            Error::Auth(_) => e,
            other => Error::Auth(other.to_string()),
        }
    })?;
    Ok(format!("{}.{}", cert_b64, ser::base64_encode(sig)))
}

/// An HTTP Basic `Authorization` value.
pub fn basic_auth(user: &str, secret: &str) -> String {
    format!("Basic {}", ser::base64_encode(format!("{}:{}", user, secret)))
}
