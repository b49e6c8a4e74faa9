//! The main error enum for the project lives here, and documents the various
//! conditions that can arise while talking to a CA or assembling transactions.

use thiserror::Error;

/// This is our error enum. It contains an entry for any part of the system in
/// which an expectation is not met or a problem occurs.
///
/// The operation-level variants (`Registration`, `Enrollment`, ...) always
/// carry the error that caused them in `source`, so nothing gets lost on the
/// way up.
#[derive(Error, Debug)]
pub enum Error {
    /// An error occurred while assembling a transaction envelope.
    #[error("transaction assembly failed: {message}")]
    Assembly {
        message: String,
        #[source]
        source: Option<Box<Error>>,
    },

    /// Listing affiliations failed.
    #[error("affiliation error: {message}")]
    Affiliation {
        message: String,
        #[source]
        source: Option<Box<Error>>,
    },

    /// A DER structure could not be decoded.
    #[error("asn.1 deserialization error: {0}")]
    ASNDeserialize(String),

    /// A DER structure could not be encoded.
    #[error("asn.1 serialization error: {0}")]
    ASNSerialize(String),

    /// Signing the auth token for a request failed.
    #[error("could not build auth token: {0}")]
    Auth(String),

    /// Failed to verify a signature
    #[error("the given signature/public key/data combo does not verify")]
    CryptoSignatureVerificationFailed,

    /// An error while decoding base64.
    #[error("base64 deserialization error")]
    DeserializeBase64(#[from] base64::DecodeError),

    /// Enrolling (or re-enrolling) an identity failed.
    #[error("enrollment error: {message}")]
    Enrollment {
        message: String,
        #[source]
        source: Option<Box<Error>>,
    },

    /// Generating a CRL failed.
    #[error("crl generation error: {message}")]
    Generation {
        message: String,
        #[source]
        source: Option<Box<Error>>,
    },

    /// Listing identities failed.
    #[error("identity error: {message}")]
    Identity {
        message: String,
        #[source]
        source: Option<Box<Error>>,
    },

    /// Fetching CA info failed.
    #[error("ca info error: {message}")]
    Info {
        message: String,
        #[source]
        source: Option<Box<Error>>,
    },

    /// A precondition was violated before any I/O happened. This is a bug in
    /// the calling code and retrying will not help.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// A JSON body could not be (de)serialized.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    /// A key container or algorithm identifier could not be encoded.
    #[error("key encoding error: {0}")]
    KeyEncoding(String),

    /// Binary key material is malformed.
    #[error("invalid key format: {0}")]
    KeyFormat(String),

    /// A key container carried a version other than zero. The version can be
    /// arbitrarily wide, so it's kept as a string: decimal, or hex past 128
    /// bits.
    #[error("key container version mismatch (supported: 0, parsed: {0})")]
    KeyVersionMismatch(String),

    /// The CA answered in a way that violates the response envelope, or with a
    /// status at/above the configured threshold.
    #[error("protocol error [HTTP status {status}]: {message}")]
    Protocol { status: u16, message: String },

    /// Registering an identity failed.
    #[error("registration error: {message}")]
    Registration {
        message: String,
        #[source]
        source: Option<Box<Error>>,
    },

    /// Revoking an identity or certificate failed.
    #[error("revocation error: {message}")]
    Revocation {
        message: String,
        #[source]
        source: Option<Box<Error>>,
    },

    /// The network layer failed (connection refused, TLS failure, timeout...).
    #[error("transport error: {0}")]
    Transport(String),

    /// A bad URL was given.
    #[error("url parse error: {0}")]
    Url(#[from] url::ParseError),

    /// An error while engaging in yaml (de)serialization.
    #[error("yaml serialization error")]
    Yaml(#[from] serde_yaml::Error),
}

macro_rules! wrap_fn {
    ($fnname:ident, $variant:ident) => {
        /// Wrap an underlying error in this operation's error type.
        pub fn $fnname<T: Into<String>>(message: T, source: Error) -> Self {
            Self::$variant {
                message: message.into(),
                source: Some(Box::new(source)),
            }
        }
    };
}

impl Error {
    wrap_fn! { assembly, Assembly }
    wrap_fn! { affiliation, Affiliation }
    wrap_fn! { enrollment, Enrollment }
    wrap_fn! { generation, Generation }
    wrap_fn! { identity, Identity }
    wrap_fn! { info, Info }
    wrap_fn! { registration, Registration }
    wrap_fn! { revocation, Revocation }

    /// Returns the HTTP status attached to this error, digging through any
    /// operation wrappers.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Protocol { status, .. } => Some(*status),
            Self::Assembly { source, .. }
            | Self::Affiliation { source, .. }
            | Self::Enrollment { source, .. }
            | Self::Generation { source, .. }
            | Self::Identity { source, .. }
            | Self::Info { source, .. }
            | Self::Registration { source, .. }
            | Self::Revocation { source, .. } => source.as_ref().and_then(|e| e.status()),
            _ => None,
        }
    }
}

// rasn's error types don't implement std::error::Error, so thiserror can't
// derive these.
impl From<rasn::error::DecodeError> for Error {
    fn from(err: rasn::error::DecodeError) -> Self {
        Self::ASNDeserialize(format!("{:?}", err))
    }
}

impl From<rasn::error::EncodeError> for Error {
    fn from(err: rasn::error::EncodeError) -> Self {
        Self::ASNSerialize(format!("{:?}", err))
    }
}

impl PartialEq for Error {
    fn eq(&self, other: &Self) -> bool {
        // serde_json/rasn errors aren't comparable, so compare the debug
        // output instead.
        format!("{:?}", self) == format!("{:?}", other)
    }
}

/// Wraps `std::result::Result` around our `Error` enum
pub type Result<T> = std::result::Result<T, Error>;
