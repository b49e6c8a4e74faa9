//! The CA client. Each operation validates its input before anything goes over
//! the wire, sends exactly one request, classifies the response, and maps the
//! result into a typed value. Failures from the network or the response are
//! wrapped in the operation's own error (keeping the cause) and never retried.

use crate::{
    ca::{
        auth,
        config::ClientConfig,
        identity::{Affiliation, CaInfo, Identity},
        request::{
            AffiliationRequest, CrlRequest, EnrollmentRequest, RegistrationRequest, RevocationReason, RevocationRequest,
            RevocationTarget,
        },
        response::{CaResponse, ResponseParser, STATUS_CODE_KEY},
        transport::{HttpRequest, HttpTransport, Transport},
        Enrollment, CONTEXT_ROOT, ENDPOINT_AFFILIATIONS, ENDPOINT_ENROLL, ENDPOINT_GENCRL, ENDPOINT_IDENTITIES,
        ENDPOINT_INFO, ENDPOINT_REENROLL, ENDPOINT_REGISTER, ENDPOINT_REVOKE, PARAM_CA_NAME_BODY, PARAM_CA_NAME_QUERY,
        PARAM_FORCE,
    },
    crypto::key::EnrollmentKey,
    error::{Error, Result},
    util::ser,
};
use rand::{CryptoRng, RngCore};
use serde::Serialize;
use serde_json::{Map, Value};
use tracing::{debug, error};
use url::Url;

const RESULT_SECRET: &str = "secret";
const RESULT_CERT: &str = "Cert";
const RESULT_CRL: &str = "CRL";
const RESULT_IDENTITIES: &str = "identities";

/// Log a failure and wrap it in an operation error.
fn fail<F>(wrap: F, message: String, err: Error) -> Error
where
    F: FnOnce(String, Error) -> Error,
{
    match err.status() {
        Some(status) => error!("[HTTP status {}] {}: {}", status, message, err),
        None => error!("{}: {}", message, err),
    }
    wrap(message, err)
}

/// Pull the result object out of a response, treating a soft failure as an
/// error for operations that can't do anything without data.
fn require_result(res: CaResponse) -> Result<Map<String, Value>> {
    let status = res.status();
    res.into_result().ok_or_else(|| Error::Protocol {
        status,
        message: "the CA declined the request".into(),
    })
}

fn result_str(result: &Map<String, Value>, key: &str) -> Result<String> {
    let status = result
        .get(STATUS_CODE_KEY)
        .and_then(|v| v.as_u64())
        .and_then(|v| u16::try_from(v).ok())
        .unwrap_or_default();
    result
        .get(key)
        .and_then(|v| v.as_str())
        .map(String::from)
        .ok_or_else(|| Error::Protocol {
            status,
            message: format!("response result has no {}", key),
        })
}

/// The identity a mutation hands back, or `None` on a soft failure.
fn identity_result(res: CaResponse) -> Result<Option<Identity>> {
    match res.into_result() {
        Some(mut result) => {
            result.remove(STATUS_CODE_KEY);
            Identity::from_value(Value::Object(result)).map(Some)
        }
        None => Ok(None),
    }
}

/// The affiliation a mutation hands back, or `None` on a soft failure.
fn affiliation_result(res: CaResponse) -> Result<Option<Affiliation>> {
    match res.into_result() {
        Some(mut result) => {
            result.remove(STATUS_CODE_KEY);
            Affiliation::from_result(result).map(Some)
        }
        None => Ok(None),
    }
}

fn with_force(mut url: Url, force: bool) -> Url {
    if force {
        url.query_pairs_mut().append_pair(PARAM_FORCE, "true");
    }
    url
}

fn require(name: &str, val: &str) -> Result<()> {
    if val.trim().is_empty() {
        Err(Error::InvalidArgument(format!("{} cannot be empty", name)))?;
    }
    Ok(())
}

/// Talks to one CA.
///
/// The client holds no per-call state, so one instance can be shared freely
/// between threads (given a thread-safe transport, which they all are).
pub struct CaClient {
    base: Url,
    ca_name: Option<String>,
    parser: ResponseParser,
    transport: Box<dyn Transport>,
}

impl std::fmt::Debug for CaClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CaClient")
            .field("base", &self.base.as_str())
            .field("ca_name", &self.ca_name)
            .field("parser", &self.parser)
            .finish()
    }
}

impl CaClient {
    /// Validate the config and build an HTTP(S) client from it.
    pub fn new(config: &ClientConfig) -> Result<Self> {
        config.validate()?;
        let transport = HttpTransport::new(config)?;
        Self::with_transport(config, transport)
    }

    /// Validate the config and use the given transport to send requests.
    pub fn with_transport<T: Transport + 'static>(config: &ClientConfig, transport: T) -> Result<Self> {
        let base = config.validate()?.join(CONTEXT_ROOT)?;
        Ok(Self {
            base,
            ca_name: config.ca_name().clone(),
            parser: ResponseParser::new(*config.status_threshold()),
            transport: Box::new(transport),
        })
    }

    /// The base all endpoints are resolved against.
    pub fn base_url(&self) -> &Url {
        &self.base
    }

    pub fn ca_name(&self) -> Option<&str> {
        self.ca_name.as_deref()
    }

    fn endpoint(&self, name: &str) -> Result<Url> {
        Ok(self.base.join(name)?)
    }

    /// `collection/name`, with `name` escaped as a single path segment.
    fn resource(&self, collection: &str, name: &str) -> Result<Url> {
        let mut url = self.endpoint(collection)?;
        url.path_segments_mut()
            .map_err(|_| Error::InvalidArgument("ca url cannot take a path".into()))?
            .push(name);
        Ok(url)
    }

    fn add_ca_query(&self, url: &mut Url) {
        if let Some(ca_name) = self.ca_name.as_ref() {
            url.query_pairs_mut().append_pair(PARAM_CA_NAME_QUERY, ca_name);
        }
    }

    /// Serialize a request body, adding the CA name if we have one.
    fn body<T: Serialize + ?Sized>(&self, req: &T) -> Result<Vec<u8>> {
        let mut val = serde_json::to_value(req)?;
        if let (Some(ca_name), Value::Object(map)) = (self.ca_name.as_ref(), &mut val) {
            map.insert(PARAM_CA_NAME_BODY.into(), Value::String(ca_name.clone()));
        }
        Ok(serde_json::to_vec(&val)?)
    }

    fn send(&self, req: HttpRequest) -> Result<CaResponse> {
        debug!("sending {}", req.describe());
        let res = self.transport.execute(&req)?;
        self.parser.parse(&req.describe(), &res)
    }

    /// POST a JSON body to an endpoint with certificate-based auth, returning
    /// the classified response. Soft failures come back as
    /// [`CaResponse::Soft`] rather than an error.
    pub fn post_json<T: Serialize + ?Sized>(&self, endpoint: &str, body: &T, registrar: &Enrollment) -> Result<CaResponse> {
        self.send_signed(HttpRequest::post, self.endpoint(endpoint)?, body, registrar)
    }

    /// PUT a JSON body to an endpoint with certificate-based auth. Soft
    /// failures come back as [`CaResponse::Soft`].
    pub fn put_json<T: Serialize + ?Sized>(&self, endpoint: &str, body: &T, registrar: &Enrollment) -> Result<CaResponse> {
        self.send_signed(HttpRequest::put, self.endpoint(endpoint)?, body, registrar)
    }

    /// DELETE an endpoint with certificate-based auth over an empty body. The
    /// CA name, if any, goes in the query string. Soft failures come back as
    /// [`CaResponse::Soft`].
    pub fn delete_json(&self, endpoint: &str, registrar: &Enrollment) -> Result<CaResponse> {
        self.delete_signed(self.endpoint(endpoint)?, registrar)
    }

    fn send_signed<T: Serialize + ?Sized>(
        &self,
        build: fn(Url, Vec<u8>) -> HttpRequest,
        url: Url,
        body: &T,
        registrar: &Enrollment,
    ) -> Result<CaResponse> {
        let body = self.body(body)?;
        let token = registrar.auth_token(&body)?;
        self.send(build(url, body).with_header("Authorization", token))
    }

    fn delete_signed(&self, mut url: Url, registrar: &Enrollment) -> Result<CaResponse> {
        self.add_ca_query(&mut url);
        let token = registrar.auth_token(b"")?;
        self.send(HttpRequest::delete(url).with_header("Authorization", token))
    }

    /// GET an endpoint, with certificate-based auth if a registrar is given.
    /// The CA name, if any, goes in the query string.
    pub fn get_json(&self, endpoint: &str, registrar: Option<&Enrollment>) -> Result<CaResponse> {
        let mut url = self.endpoint(endpoint)?;
        self.add_ca_query(&mut url);
        let mut req = HttpRequest::get(url);
        if let Some(registrar) = registrar {
            req = req.with_header("Authorization", registrar.auth_token(b"")?);
        }
        self.send(req)
    }

    /// Register a new identity, returning its enrollment secret.
    pub fn register(&self, request: &RegistrationRequest, registrar: &Enrollment) -> Result<String> {
        request.validate()?;
        let id = request.enrollment_id();
        debug!("register url: {}, id: {}", self.base, id);
        let secret = self
            .post_json(ENDPOINT_REGISTER, request, registrar)
            .and_then(require_result)
            .and_then(|result| result_str(&result, RESULT_SECRET))
            .map_err(|e| fail(Error::registration, format!("error while registering {} at {}", id, self.base), e))?;
        debug!("register url: {}, id: {} done", self.base, id);
        Ok(secret)
    }

    fn decode_cert(result: &Map<String, Value>) -> Result<String> {
        let cert_b64 = result_str(result, RESULT_CERT)?;
        let cert = ser::base64_decode(cert_b64.as_bytes())?;
        String::from_utf8(cert).map_err(|_| Error::Protocol {
            status: 0,
            message: "returned certificate is not utf8 pem".into(),
        })
    }

    /// Enroll an identity with its secret (HTTP Basic auth), returning the new
    /// enrollment.
    ///
    /// If the request has no CSR, one is generated for `user`, using the
    /// request's key if it has one or a fresh key from `rng` if not.
    pub fn enroll<R: RngCore + CryptoRng>(
        &self,
        rng: &mut R,
        user: &str,
        secret: &str,
        request: &EnrollmentRequest,
    ) -> Result<Enrollment> {
        require("enrollment user", user)?;
        require("enrollment secret", secret)?;
        request.validate()?;
        debug!("enroll url: {}, user: {}", self.base, user);

        let key = match request.key() {
            Some(key) => key.clone(),
            None => {
                debug!("generating enrollment key for {}", user);
                EnrollmentKey::new_p256(rng)
            }
        };
        let csr = match request.csr() {
            Some(csr) => csr.clone(),
            None => key
                .certificate_request(user, request.hosts())
                .map_err(|e| fail(Error::enrollment, format!("failed to build a csr for {}", user), e))?,
        };
        let cert = self
            .endpoint(ENDPOINT_ENROLL)
            .and_then(|url| Ok((url, self.body(&request.body(&csr))?)))
            .and_then(|(url, body)| {
                self.send(HttpRequest::post(url, body).with_header("Authorization", auth::basic_auth(user, secret)))
            })
            .and_then(require_result)
            .and_then(|result| Self::decode_cert(&result))
            .map_err(|e| fail(Error::enrollment, format!("failed to enroll user {} at {}", user, self.base), e))?;
        debug!("enroll url: {}, user: {} done", self.base, user);
        Ok(Enrollment::new(key, cert))
    }

    /// Get a fresh certificate for an existing enrollment. The new certificate
    /// is over the request's key if it has one, otherwise the enrollment's own.
    pub fn reenroll(&self, user: &Enrollment, request: &EnrollmentRequest) -> Result<Enrollment> {
        request.validate()?;
        let name = user.common_name()?;
        debug!("re-enroll url: {}, user: {}", self.base, name);
        let key = request.key().clone().unwrap_or_else(|| user.key().clone());
        let csr = match request.csr() {
            Some(csr) => csr.clone(),
            None => key
                .certificate_request(&name, request.hosts())
                .map_err(|e| fail(Error::enrollment, format!("failed to build a csr for {}", name), e))?,
        };
        let cert = self
            .post_json(ENDPOINT_REENROLL, &request.body(&csr), user)
            .and_then(require_result)
            .and_then(|result| Self::decode_cert(&result))
            .map_err(|e| fail(Error::enrollment, format!("failed to re-enroll user {} at {}", name, self.base), e))?;
        debug!("re-enroll url: {}, user: {} done", self.base, name);
        Ok(Enrollment::new(key, cert))
    }

    /// Revoke an identity or a single certificate. If `generate_crl` is set,
    /// the CA's fresh CRL (base64 PEM) is returned.
    pub fn revoke(
        &self,
        registrar: &Enrollment,
        target: &RevocationTarget<'_>,
        reason: Option<RevocationReason>,
        generate_crl: bool,
    ) -> Result<Option<String>> {
        let request = RevocationRequest::from_target(target, reason, generate_crl)?;
        debug!("revoke url: {}, reason: {:?}, gencrl: {}", self.base, reason, generate_crl);
        let crl = self
            .post_json(ENDPOINT_REVOKE, &request, registrar)
            .and_then(require_result)
            .and_then(|result| match generate_crl {
                true => result_str(&result, RESULT_CRL).map(Some),
                false => Ok(None),
            })
            .map_err(|e| fail(Error::revocation, format!("error while revoking at {}", self.base), e))?;
        debug!("revoke url: {} done", self.base);
        Ok(crl)
    }

    /// Generate a CRL (base64 PEM), optionally bounded by revocation and
    /// expiry times.
    pub fn generate_crl(&self, registrar: &Enrollment, request: &CrlRequest) -> Result<String> {
        debug!("gencrl url: {}", self.base);
        let crl = self
            .post_json(ENDPOINT_GENCRL, request, registrar)
            .and_then(require_result)
            .and_then(|result| result_str(&result, RESULT_CRL))
            .map_err(|e| fail(Error::generation, format!("error while generating crl at {}", self.base), e))?;
        debug!("gencrl url: {} done", self.base);
        Ok(crl)
    }

    /// List the identities the registrar is allowed to see. A soft failure
    /// lists nothing.
    pub fn list_identities(&self, registrar: &Enrollment) -> Result<Vec<Identity>> {
        debug!("identities url: {}", self.base);
        let identities = self
            .get_json(ENDPOINT_IDENTITIES, Some(registrar))
            .and_then(|res| {
                let result = match res.into_result() {
                    Some(result) => result,
                    None => return Ok(Vec::new()),
                };
                match result.get(RESULT_IDENTITIES) {
                    Some(Value::Array(list)) => list.iter().cloned().map(Identity::from_value).collect(),
                    Some(Value::Null) | None => Ok(Vec::new()),
                    Some(_) => Err(Error::Protocol {
                        status: 0,
                        message: "identities is not a list".into(),
                    }),
                }
            })
            .map_err(|e| fail(Error::identity, format!("error while getting all users from {}", self.base), e))?;
        debug!("identities url: {} done, {} found", self.base, identities.len());
        Ok(identities)
    }

    /// Create an identity. What comes back is the identity as the CA recorded
    /// it, including the secret it generated (see [`Identity::secret`]), or
    /// `None` if the CA softly declined.
    pub fn create_identity(&self, request: &RegistrationRequest, registrar: &Enrollment) -> Result<Option<Identity>> {
        request.validate()?;
        let id = request.enrollment_id();
        debug!("identity create url: {}, id: {}", self.base, id);
        let identity = self
            .endpoint(ENDPOINT_IDENTITIES)
            .and_then(|url| self.send_signed(HttpRequest::post, url, request, registrar))
            .and_then(identity_result)
            .map_err(|e| fail(Error::identity, format!("error while creating identity {} at {}", id, self.base), e))?;
        debug!("identity create url: {}, id: {} done", self.base, id);
        Ok(identity)
    }

    /// Replace an existing identity's type, affiliation, attributes, enrollment
    /// limit and (if given) secret.
    pub fn update_identity(&self, request: &RegistrationRequest, registrar: &Enrollment) -> Result<Option<Identity>> {
        request.validate()?;
        let id = request.enrollment_id();
        debug!("identity update url: {}, id: {}", self.base, id);
        let identity = self
            .resource(ENDPOINT_IDENTITIES, id)
            .and_then(|url| self.send_signed(HttpRequest::put, url, request, registrar))
            .and_then(identity_result)
            .map_err(|e| fail(Error::identity, format!("error while updating identity {} at {}", id, self.base), e))?;
        debug!("identity update url: {}, id: {} done", self.base, id);
        Ok(identity)
    }

    /// Remove an identity, returning what the CA had on record for it. `force`
    /// is needed for a registrar to remove itself.
    pub fn delete_identity(&self, id: &str, force: bool, registrar: &Enrollment) -> Result<Option<Identity>> {
        require("enrollment id", id)?;
        debug!("identity delete url: {}, id: {}", self.base, id);
        let identity = self
            .resource(ENDPOINT_IDENTITIES, id)
            .and_then(|url| self.delete_signed(with_force(url, force), registrar))
            .and_then(identity_result)
            .map_err(|e| fail(Error::identity, format!("error while deleting identity {} at {}", id, self.base), e))?;
        debug!("identity delete url: {}, id: {} done", self.base, id);
        Ok(identity)
    }

    /// Create an affiliation. With `force` set, missing parents are created
    /// along the way.
    pub fn create_affiliation(&self, request: &AffiliationRequest, registrar: &Enrollment) -> Result<Option<Affiliation>> {
        request.validate()?;
        let name = request.name();
        debug!("affiliation create url: {}, name: {}", self.base, name);
        let affiliation = self
            .endpoint(ENDPOINT_AFFILIATIONS)
            .and_then(|url| self.send_signed(HttpRequest::post, with_force(url, *request.force()), request, registrar))
            .and_then(affiliation_result)
            .map_err(|e| fail(Error::affiliation, format!("error while creating affiliation {} at {}", name, self.base), e))?;
        debug!("affiliation create url: {}, name: {} done", self.base, name);
        Ok(affiliation)
    }

    /// Rename the affiliation `name` to the request's name. With `force` set,
    /// the affiliations and identities underneath are renamed with it.
    pub fn update_affiliation(
        &self,
        name: &str,
        request: &AffiliationRequest,
        registrar: &Enrollment,
    ) -> Result<Option<Affiliation>> {
        require("affiliation name", name)?;
        request.validate()?;
        debug!("affiliation update url: {}, name: {} -> {}", self.base, name, request.name());
        let affiliation = self
            .resource(ENDPOINT_AFFILIATIONS, name)
            .and_then(|url| self.send_signed(HttpRequest::put, with_force(url, *request.force()), request, registrar))
            .and_then(affiliation_result)
            .map_err(|e| fail(Error::affiliation, format!("error while updating affiliation {} at {}", name, self.base), e))?;
        debug!("affiliation update url: {}, name: {} done", self.base, name);
        Ok(affiliation)
    }

    /// Remove an affiliation. With `force` set, everything underneath goes
    /// too.
    pub fn delete_affiliation(&self, name: &str, force: bool, registrar: &Enrollment) -> Result<Option<Affiliation>> {
        require("affiliation name", name)?;
        debug!("affiliation delete url: {}, name: {}", self.base, name);
        let affiliation = self
            .resource(ENDPOINT_AFFILIATIONS, name)
            .and_then(|url| self.delete_signed(with_force(url, force), registrar))
            .and_then(affiliation_result)
            .map_err(|e| fail(Error::affiliation, format!("error while deleting affiliation {} at {}", name, self.base), e))?;
        debug!("affiliation delete url: {}, name: {} done", self.base, name);
        Ok(affiliation)
    }

    /// Get the affiliation tree the registrar is allowed to see. A soft
    /// failure gives an empty tree.
    pub fn list_affiliations(&self, registrar: &Enrollment) -> Result<Affiliation> {
        debug!("affiliations url: {}", self.base);
        let affiliations = self
            .get_json(ENDPOINT_AFFILIATIONS, Some(registrar))
            .and_then(|res| match res.into_result() {
                Some(result) => Affiliation::from_result(result),
                None => Ok(Affiliation::default()),
            })
            .map_err(|e| fail(Error::affiliation, format!("error while getting all affiliations from {}", self.base), e))?;
        debug!("affiliations url: {} done", self.base);
        Ok(affiliations)
    }

    /// Ask the CA about itself. Needs no credentials.
    pub fn info(&self) -> Result<CaInfo> {
        debug!("info url: {}", self.base);
        let info = self
            .get_json(ENDPOINT_INFO, None)
            .and_then(require_result)
            .and_then(CaInfo::from_result)
            .map_err(|e| fail(Error::info, format!("error while getting ca info from {}", self.base), e))?;
        debug!("info url: {} done", self.base);
        Ok(info)
    }
}
