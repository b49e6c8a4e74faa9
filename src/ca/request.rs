//! Request values handed to [`CaClient`](crate::ca::client::CaClient). These
//! are built once by the caller, validated before anything touches the
//! network, and serialized straight into the JSON body the CA expects.

use crate::{
    ca::Enrollment,
    crypto::key::EnrollmentKey,
    error::{Error, Result},
    util::Timestamp,
};
use serde_derive::{Deserialize, Serialize};

fn require(name: &str, val: &str) -> Result<()> {
    if val.trim().is_empty() {
        Err(Error::InvalidArgument(format!("{} cannot be empty", name)))?;
    }
    Ok(())
}

/// A name/value attribute attached to an identity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, getset::Getters)]
#[getset(get = "pub")]
pub struct Attribute {
    name: String,
    value: String,
    /// Whether the attribute lands in enrollment certificates by default.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    ecert: Option<bool>,
}

impl Attribute {
    pub fn new<N: Into<String>, V: Into<String>>(name: N, value: V, ecert: Option<bool>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
            ecert,
        }
    }
}

/// Asks for a specific attribute to be put into an enrollment certificate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, getset::Getters)]
#[getset(get = "pub")]
pub struct AttributeRequest {
    name: String,
    /// If false, enrollment fails when the identity lacks the attribute.
    optional: bool,
}

impl AttributeRequest {
    pub fn new<N: Into<String>>(name: N, optional: bool) -> Self {
        Self {
            name: name.into(),
            optional,
        }
    }
}

/// Registers a new identity with the CA.
#[derive(Debug, Clone, PartialEq, Serialize, getset::Getters, getset::Setters)]
#[getset(get = "pub", set = "pub")]
pub struct RegistrationRequest {
    #[serde(rename = "id")]
    enrollment_id: String,
    /// `client`, `peer`, `orderer`, `user`... see the `IDENTITY_TYPE_*` consts.
    #[serde(rename = "type")]
    identity_type: String,
    /// Leave empty to have the CA generate one.
    #[serde(skip_serializing_if = "Option::is_none")]
    secret: Option<String>,
    /// `None` uses the CA's default, `-1` means unlimited.
    #[serde(skip_serializing_if = "Option::is_none")]
    max_enrollments: Option<i32>,
    affiliation: String,
    attrs: Vec<Attribute>,
}

impl RegistrationRequest {
    pub fn new<I: Into<String>, T: Into<String>>(enrollment_id: I, identity_type: T) -> Self {
        Self {
            enrollment_id: enrollment_id.into(),
            identity_type: identity_type.into(),
            secret: None,
            max_enrollments: None,
            affiliation: String::new(),
            attrs: Vec::new(),
        }
    }

    pub fn validate(&self) -> Result<()> {
        require("enrollment id", &self.enrollment_id)?;
        require("identity type", &self.identity_type)?;
        if matches!(self.secret.as_deref(), Some("")) {
            Err(Error::InvalidArgument("secret, if given, cannot be empty".into()))?;
        }
        Ok(())
    }
}

/// Creates or renames an affiliation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, getset::Getters, getset::Setters)]
#[getset(get = "pub", set = "pub")]
pub struct AffiliationRequest {
    /// The full dotted name (`org1.department1`). On update this is the new
    /// name.
    name: String,
    /// Create missing parents, or carry a rename/delete down to the
    /// affiliations and identities underneath. Sent in the query string.
    #[serde(skip)]
    force: bool,
}

impl AffiliationRequest {
    pub fn new<N: Into<String>>(name: N) -> Self {
        Self {
            name: name.into(),
            force: false,
        }
    }

    pub fn validate(&self) -> Result<()> {
        require("affiliation name", &self.name)
    }
}

/// Options for enroll/reenroll.
///
/// If no CSR is given, one is generated. If no key is given either, a fresh
/// one is generated first. A CSR without the key that made it is rejected.
#[derive(Debug, Clone, Default, PartialEq, getset::Getters, getset::Setters)]
#[getset(get = "pub", set = "pub")]
pub struct EnrollmentRequest {
    /// PEM-encoded PKCS#10 request.
    csr: Option<String>,
    key: Option<EnrollmentKey>,
    hosts: Vec<String>,
    profile: Option<String>,
    label: Option<String>,
    attr_reqs: Vec<AttributeRequest>,
}

impl EnrollmentRequest {
    pub fn validate(&self) -> Result<()> {
        if self.csr.is_some() && self.key.is_none() {
            Err(Error::InvalidArgument(
                "if a certificate signing request is supplied, the key that made it must be supplied too".into(),
            ))?;
        }
        if let Some(csr) = self.csr.as_deref() {
            require("certificate signing request", csr)?;
        }
        Ok(())
    }

    /// The JSON body for a given CSR.
    pub(crate) fn body<'a>(&'a self, csr: &'a str) -> EnrollmentBody<'a> {
        EnrollmentBody {
            certificate_request: csr,
            hosts: &self.hosts,
            profile: self.profile.as_deref(),
            label: self.label.as_deref(),
            attr_reqs: &self.attr_reqs,
        }
    }
}

fn is_empty<T>(list: &&[T]) -> bool {
    list.is_empty()
}

#[derive(Debug, Serialize)]
pub(crate) struct EnrollmentBody<'a> {
    certificate_request: &'a str,
    #[serde(skip_serializing_if = "is_empty")]
    hosts: &'a [String],
    #[serde(skip_serializing_if = "Option::is_none")]
    profile: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    label: Option<&'a str>,
    #[serde(skip_serializing_if = "is_empty")]
    attr_reqs: &'a [AttributeRequest],
}

/// RFC 5280 revocation reasons, spelled the way the CA wants them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RevocationReason {
    #[serde(rename = "unspecified")]
    Unspecified,
    #[serde(rename = "keyCompromise")]
    KeyCompromise,
    #[serde(rename = "cACompromise")]
    CaCompromise,
    #[serde(rename = "affiliationChanged")]
    AffiliationChanged,
    #[serde(rename = "superseded")]
    Superseded,
    #[serde(rename = "cessationOfOperation")]
    CessationOfOperation,
    #[serde(rename = "certificateHold")]
    CertificateHold,
    #[serde(rename = "removeFromCRL")]
    RemoveFromCrl,
    #[serde(rename = "privilegeWithdrawn")]
    PrivilegeWithdrawn,
    #[serde(rename = "aACompromise")]
    AaCompromise,
}

/// What to revoke.
#[derive(Debug, Clone, PartialEq)]
pub enum RevocationTarget<'a> {
    /// The certificate held by this enrollment.
    Enrollment(&'a Enrollment),
    /// Every certificate belonging to this identity.
    Identity(String),
    /// A single certificate by serial number and authority key identifier
    /// (both hex).
    Certificate { serial: String, aki: String },
}

/// A revocation, ready to send. Names either an identity or a single
/// certificate, never both.
#[derive(Debug, Clone, PartialEq, Serialize, getset::Getters)]
#[getset(get = "pub")]
pub struct RevocationRequest {
    #[serde(rename = "id", skip_serializing_if = "Option::is_none")]
    enrollment_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    serial: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    aki: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    reason: Option<RevocationReason>,
    #[serde(rename = "gencrl")]
    generate_crl: bool,
}

impl RevocationRequest {
    /// Build a revocation request, enforcing that exactly one of
    /// `enrollment_id` or `serial`+`aki` is given.
    pub fn new(
        enrollment_id: Option<String>,
        serial: Option<String>,
        aki: Option<String>,
        reason: Option<RevocationReason>,
        generate_crl: bool,
    ) -> Result<Self> {
        for (name, val) in [("enrollment id", &enrollment_id), ("serial", &serial), ("aki", &aki)] {
            if let Some(val) = val {
                require(name, val)?;
            }
        }
        match (&enrollment_id, &serial, &aki) {
            (Some(_), None, None) | (None, Some(_), Some(_)) => {}
            (Some(_), _, _) => Err(Error::InvalidArgument(
                "revoke either an enrollment id or a serial/aki pair, not both".into(),
            ))?,
            (None, Some(_), None) => Err(Error::InvalidArgument("aki is required to revoke a certificate".into()))?,
            (None, None, Some(_)) => Err(Error::InvalidArgument("serial is required to revoke a certificate".into()))?,
            (None, None, None) => Err(Error::InvalidArgument("nothing to revoke".into()))?,
        }
        Ok(Self {
            enrollment_id,
            serial,
            aki,
            reason,
            generate_crl,
        })
    }

    /// Build a request from a [`RevocationTarget`], pulling the serial and AKI
    /// out of the enrollment's certificate if that's what we're given.
    pub fn from_target(target: &RevocationTarget<'_>, reason: Option<RevocationReason>, generate_crl: bool) -> Result<Self> {
        match target {
            RevocationTarget::Enrollment(enrollment) => {
                let serial = enrollment.serial_hex()?;
                let aki = enrollment.aki_hex()?;
                Self::new(None, Some(serial), Some(aki), reason, generate_crl)
            }
            RevocationTarget::Identity(id) => Self::new(Some(id.clone()), None, None, reason, generate_crl),
            RevocationTarget::Certificate { serial, aki } => {
                Self::new(None, Some(serial.clone()), Some(aki.clone()), reason, generate_crl)
            }
        }
    }
}

/// Bounds for CRL generation. Every bound is optional.
#[derive(Debug, Clone, Default, PartialEq, Serialize, getset::Getters, getset::Setters)]
#[getset(get = "pub", set = "pub")]
#[serde(rename_all = "camelCase")]
pub struct CrlRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    revoked_before: Option<Timestamp>,
    #[serde(skip_serializing_if = "Option::is_none")]
    revoked_after: Option<Timestamp>,
    #[serde(skip_serializing_if = "Option::is_none")]
    expire_before: Option<Timestamp>,
    #[serde(skip_serializing_if = "Option::is_none")]
    expire_after: Option<Timestamp>,
}

impl CrlRequest {
    pub fn new(
        revoked_before: Option<Timestamp>,
        revoked_after: Option<Timestamp>,
        expire_before: Option<Timestamp>,
        expire_after: Option<Timestamp>,
    ) -> Self {
        Self {
            revoked_before,
            revoked_after,
            expire_before,
            expire_after,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::str::FromStr;

    #[test]
    fn registration_json() {
        let mut req = RegistrationRequest::new("alice", "client");
        req.set_affiliation("org1.department1".into());
        req.set_max_enrollments(Some(-1));
        req.set_attrs(vec![Attribute::new("hf.Revoker", "true", None), Attribute::new("role", "auditor", Some(true))]);
        req.validate().unwrap();
        assert_eq!(
            serde_json::to_value(&req).unwrap(),
            json!({
                "id": "alice",
                "type": "client",
                "max_enrollments": -1,
                "affiliation": "org1.department1",
                "attrs": [
                    {"name": "hf.Revoker", "value": "true"},
                    {"name": "role", "value": "auditor", "ecert": true},
                ],
            })
        );
    }

    #[test]
    fn registration_validate() {
        assert!(matches!(RegistrationRequest::new("", "client").validate(), Err(Error::InvalidArgument(_))));
        assert!(matches!(RegistrationRequest::new("bob", " ").validate(), Err(Error::InvalidArgument(_))));
        let mut req = RegistrationRequest::new("bob", "peer");
        req.set_secret(Some("".into()));
        assert!(matches!(req.validate(), Err(Error::InvalidArgument(_))));
    }

    #[test]
    fn affiliation_request() {
        let mut req = AffiliationRequest::new("org1.department3");
        req.validate().unwrap();
        req.set_force(true);
        assert_eq!(serde_json::to_value(&req).unwrap(), json!({"name": "org1.department3"}));
        assert!(matches!(AffiliationRequest::new(" ").validate(), Err(Error::InvalidArgument(_))));
    }

    #[test]
    fn enrollment_validate() {
        EnrollmentRequest::default().validate().unwrap();
        let mut req = EnrollmentRequest::default();
        req.set_csr(Some("-----BEGIN CERTIFICATE REQUEST-----".into()));
        assert!(matches!(req.validate(), Err(Error::InvalidArgument(_))));
        req.set_key(Some(EnrollmentKey::new_p256(&mut crate::util::test::rng())));
        req.validate().unwrap();
    }

    #[test]
    fn enrollment_body_json() {
        let mut req = EnrollmentRequest::default();
        assert_eq!(serde_json::to_value(req.body("CSR")).unwrap(), json!({"certificate_request": "CSR"}));
        req.set_hosts(vec!["peer0.org1".into()]);
        req.set_profile(Some("tls".into()));
        req.set_attr_reqs(vec![AttributeRequest::new("role", true)]);
        assert_eq!(
            serde_json::to_value(req.body("CSR")).unwrap(),
            json!({
                "certificate_request": "CSR",
                "hosts": ["peer0.org1"],
                "profile": "tls",
                "attr_reqs": [{"name": "role", "optional": true}],
            })
        );
    }

    #[test]
    fn revocation_one_of() {
        let both = RevocationRequest::new(Some("alice".into()), Some("AB12".into()), Some("CD34".into()), None, false);
        assert!(matches!(both, Err(Error::InvalidArgument(_))));
        let id_and_serial = RevocationRequest::new(Some("alice".into()), Some("AB12".into()), None, None, false);
        assert!(matches!(id_and_serial, Err(Error::InvalidArgument(_))));
        let no_aki = RevocationRequest::new(None, Some("AB12".into()), None, None, false);
        assert!(matches!(no_aki, Err(Error::InvalidArgument(_))));
        let no_serial = RevocationRequest::new(None, None, Some("CD34".into()), None, false);
        assert!(matches!(no_serial, Err(Error::InvalidArgument(_))));
        let nothing = RevocationRequest::new(None, None, None, None, false);
        assert!(matches!(nothing, Err(Error::InvalidArgument(_))));
        let empty_id = RevocationRequest::new(Some("".into()), None, None, None, false);
        assert!(matches!(empty_id, Err(Error::InvalidArgument(_))));

        let by_id = RevocationRequest::new(Some("alice".into()), None, None, None, false).unwrap();
        assert_eq!(serde_json::to_value(&by_id).unwrap(), json!({"id": "alice", "gencrl": false}));
        let by_cert =
            RevocationRequest::new(None, Some("AB12".into()), Some("CD34".into()), Some(RevocationReason::KeyCompromise), true)
                .unwrap();
        assert_eq!(
            serde_json::to_value(&by_cert).unwrap(),
            json!({"serial": "AB12", "aki": "CD34", "reason": "keyCompromise", "gencrl": true})
        );
    }

    #[test]
    fn revocation_reason_names() {
        assert_eq!(serde_json::to_value(RevocationReason::CaCompromise).unwrap(), json!("cACompromise"));
        assert_eq!(serde_json::to_value(RevocationReason::RemoveFromCrl).unwrap(), json!("removeFromCRL"));
        let reason: RevocationReason = serde_json::from_value(json!("aACompromise")).unwrap();
        assert_eq!(reason, RevocationReason::AaCompromise);
    }

    #[test]
    fn crl_json() {
        assert_eq!(serde_json::to_value(CrlRequest::default()).unwrap(), json!({}));
        let req = CrlRequest::new(
            Some(Timestamp::from_str("2028-01-02T03:04:05.678Z").unwrap()),
            None,
            None,
            Some(Timestamp::from_str("2027-06-01T12:00:00+02:00").unwrap()),
        );
        assert_eq!(
            serde_json::to_value(&req).unwrap(),
            json!({"revokedBefore": "2028-01-02T03:04:05.678Z", "expireAfter": "2027-06-01T10:00:00.000Z"})
        );
    }
}
