use crate::{
    ca::transport::{HttpRequest, HttpResponse, Transport},
    crypto::key::EnrollmentKey,
    error::{Error, Result},
};
use rand::{CryptoRng, RngCore, SeedableRng};
use rand_chacha::ChaCha20Rng;
use sha2::{Digest, Sha256};
use std::collections::VecDeque;
use std::sync::Mutex;

/// A fixed-seed RNG so test runs are reproducible.
pub(crate) fn rng() -> ChaCha20Rng {
    ChaCha20Rng::from_seed([0u8; 32])
}

/// An RNG seeded from an arbitrary byte string, for when a test wants a
/// different (but still reproducible) stream.
pub(crate) fn rng_seeded(seed: &[u8]) -> ChaCha20Rng {
    let seed: [u8; 32] = Sha256::digest(seed).into();
    ChaCha20Rng::from_seed(seed)
}

fn key_pair(key: &EnrollmentKey) -> rcgen::KeyPair {
    rcgen::KeyPair::from_pem(&key.to_pkcs8_pem().unwrap()).unwrap()
}

fn ca_params() -> rcgen::CertificateParams {
    let mut params = rcgen::CertificateParams::new(Vec::<String>::new()).unwrap();
    params.is_ca = rcgen::IsCa::Ca(rcgen::BasicConstraints::Unconstrained);
    let mut dn = rcgen::DistinguishedName::new();
    dn.push(rcgen::DnType::CommonName, "test ca");
    params.distinguished_name = dn;
    params
}

/// A self-signed CA: its key and PEM certificate.
pub(crate) fn ca<R: RngCore + CryptoRng>(rng: &mut R) -> (EnrollmentKey, String) {
    let key = EnrollmentKey::new_p256(rng);
    let cert = ca_params().self_signed(&key_pair(&key)).unwrap();
    (key, cert.pem())
}

/// Issue a PEM certificate for `key` from the CA made by [`ca`].
pub(crate) fn issue(ca_key: &EnrollmentKey, key: &EnrollmentKey, common_name: &str, serial: &[u8]) -> String {
    let issuer = rcgen::Issuer::new(ca_params(), key_pair(ca_key));
    let mut params = rcgen::CertificateParams::new(Vec::<String>::new()).unwrap();
    let mut dn = rcgen::DistinguishedName::new();
    dn.push(rcgen::DnType::CommonName, common_name);
    params.distinguished_name = dn;
    params.serial_number = Some(rcgen::SerialNumber::from_slice(serial));
    params.use_authority_key_identifier_extension = true;
    params.signed_by(&key_pair(key), &issuer).unwrap().pem()
}

/// An in-memory CA. Replays canned responses in order and remembers every
/// request it was handed.
#[derive(Default)]
pub(crate) struct MockTransport {
    responses: Mutex<VecDeque<Result<HttpResponse>>>,
    requests: Mutex<Vec<HttpRequest>>,
}

impl MockTransport {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Queue a response with the given status and JSON body.
    pub(crate) fn push_json(&self, status: u16, body: serde_json::Value) {
        self.push(Ok(HttpResponse::new(status, Some(body.to_string()))));
    }

    /// Queue a raw response (or a transport failure).
    pub(crate) fn push(&self, res: Result<HttpResponse>) {
        self.responses.lock().unwrap().push_back(res);
    }

    /// Everything that has been sent so far.
    pub(crate) fn requests(&self) -> Vec<HttpRequest> {
        self.requests.lock().unwrap().clone()
    }

    /// The last request sent, with its body parsed as JSON.
    pub(crate) fn last_json(&self) -> serde_json::Value {
        let req = self.requests.lock().unwrap().last().cloned().unwrap();
        serde_json::from_slice(req.body().as_ref().unwrap()).unwrap()
    }
}

impl Transport for MockTransport {
    fn execute(&self, request: &HttpRequest) -> Result<HttpResponse> {
        self.requests.lock().unwrap().push(request.clone());
        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(Error::Transport("mock: no responses left".into())))
    }
}
