//! Encoding and decoding of private key material, and reconstruction of EC
//! public keys from their raw point encoding.
//!
//! The private key container is the PKCS#8 `PrivateKeyInfo` layout:
//!
//! ```text
//! SEQUENCE {
//!     version             INTEGER (always 0),
//!     algorithm           SEQUENCE { OBJECT IDENTIFIER, parameters OPTIONAL },
//!     privateKey          OCTET STRING
//! }
//! ```
//!
//! Everything in here is a pure transform over byte buffers. Reading keys off
//! disk (or anywhere else) is the caller's problem.

use crate::{
    error::{Error, Result},
    util::ser,
};
use rasn::{
    types::{Any, ObjectIdentifier, OctetString},
    AsnType, Decode, Encode,
};
use zeroize::Zeroizing;

/// The DER tag of a constructed SEQUENCE.
const ASN1_SEQUENCE: u8 = 0x30;
/// The DER tag of an INTEGER.
const ASN1_INTEGER: u8 = 0x02;
/// Marks an uncompressed EC point (`0x04 || X || Y`).
const POINT_UNCOMPRESSED: u8 = 0x04;
/// DER encoding of ASN.1 NULL, which some algorithms use as "no parameters".
const ASN1_NULL: [u8; 2] = [0x05, 0x00];

/// id-ecPublicKey
pub const OID_EC_PUBLIC_KEY: &[u32] = &[1, 2, 840, 10045, 2, 1];
/// prime256v1 / secp256r1
pub const OID_CURVE_P256: &[u32] = &[1, 2, 840, 10045, 3, 1, 7];
/// secp384r1
pub const OID_CURVE_P384: &[u32] = &[1, 3, 132, 0, 34];
/// sm2p256v1
pub const OID_CURVE_SM2: &[u32] = &[1, 2, 156, 10197, 1, 301];

/// Identifies the algorithm a private key belongs to: an object identifier
/// plus an optional named-curve parameter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AlgorithmId {
    oid: Vec<u32>,
    parameters: Option<Vec<u32>>,
}

impl AlgorithmId {
    /// Create a new algorithm identifier from its OID arcs and (optionally) the
    /// OID arcs of its parameter.
    pub fn new(oid: Vec<u32>, parameters: Option<Vec<u32>>) -> Self {
        Self { oid, parameters }
    }

    /// An EC key on the given curve.
    pub fn ec(curve: EcCurve) -> Self {
        Self::new(OID_EC_PUBLIC_KEY.to_vec(), Some(curve.oid().to_vec()))
    }

    /// The algorithm's object identifier arcs.
    pub fn oid(&self) -> &[u32] {
        &self.oid
    }

    /// The parameter's object identifier arcs, if any.
    pub fn parameters(&self) -> Option<&[u32]> {
        self.parameters.as_deref()
    }

    /// If this identifies an EC key on a curve we know about, return the curve.
    pub fn ec_curve(&self) -> Option<EcCurve> {
        if self.oid != OID_EC_PUBLIC_KEY {
            return None;
        }
        self.parameters.as_deref().and_then(EcCurve::from_oid)
    }
}

/// The elliptic curves we know the coordinate width of.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EcCurve {
    /// NIST P-256
    P256,
    /// NIST P-384
    P384,
    /// SM2 (GB/T 32918)
    Sm2,
}

impl EcCurve {
    /// Byte length of a single coordinate on this curve.
    pub fn coordinate_len(&self) -> usize {
        match self {
            Self::P256 | Self::Sm2 => 32,
            Self::P384 => 48,
        }
    }

    /// The named-curve OID for this curve.
    pub fn oid(&self) -> &'static [u32] {
        match self {
            Self::P256 => OID_CURVE_P256,
            Self::P384 => OID_CURVE_P384,
            Self::Sm2 => OID_CURVE_SM2,
        }
    }

    /// Look up a curve by its named-curve OID.
    pub fn from_oid(oid: &[u32]) -> Option<Self> {
        [Self::P256, Self::P384, Self::Sm2].into_iter().find(|c| c.oid() == oid)
    }
}

#[derive(Debug, Clone, PartialEq, AsnType, Encode, Decode)]
struct AlgorithmIdentifier {
    algorithm: ObjectIdentifier,
    parameters: Option<Any>,
}

#[derive(Debug, Clone, PartialEq, AsnType, Encode, Decode)]
struct PrivateKeyContainer {
    version: i64,
    algorithm: AlgorithmIdentifier,
    private_key: OctetString,
}

/// The container as it comes off the wire, with the version and algorithm
/// left unparsed so each layer can be checked (and reported) on its own. The
/// version can be an INTEGER of any width.
#[derive(Debug, Clone, AsnType, Decode)]
struct RawPrivateKeyContainer {
    version: Any,
    algorithm: Any,
    private_key: OctetString,
}

/// Pull the content octets out of a DER-encoded INTEGER.
fn integer_content(tlv: &[u8]) -> Result<&[u8]> {
    let bad = || Error::KeyFormat("container version is not an integer".into());
    let (tag, rest) = tlv.split_first().ok_or_else(bad)?;
    if *tag != ASN1_INTEGER {
        Err(bad())?;
    }
    let (len, rest) = rest.split_first().ok_or_else(bad)?;
    let content = match *len & 0x80 {
        0 => rest,
        _ => rest.get(usize::from(*len & 0x7f)..).ok_or_else(bad)?,
    };
    if content.is_empty() {
        Err(bad())?;
    }
    Ok(content)
}

/// Render INTEGER content octets in decimal, or hex if wider than 128 bits.
fn integer_to_string(content: &[u8]) -> String {
    if content.len() > 16 {
        return format!("0x{}", hex::encode_upper(content));
    }
    let fill = if content[0] & 0x80 != 0 { 0xff } else { 0x00 };
    let mut buf = [fill; 16];
    buf[16 - content.len()..].copy_from_slice(content);
    i128::from_be_bytes(buf).to_string()
}

fn to_object_identifier(arcs: &[u32]) -> Result<ObjectIdentifier> {
    let valid = match arcs {
        [first, second, ..] => *first <= 2 && (*first == 2 || *second < 40),
        _ => false,
    };
    if !valid {
        Err(Error::KeyEncoding(format!("cannot serialize object identifier {:?}", arcs)))?;
    }
    ObjectIdentifier::new(arcs.to_vec()).ok_or_else(|| Error::KeyEncoding(format!("cannot serialize object identifier {:?}", arcs)))
}

fn from_object_identifier(oid: &ObjectIdentifier) -> Vec<u32> {
    oid.iter().copied().collect()
}

impl TryFrom<&AlgorithmId> for AlgorithmIdentifier {
    type Error = Error;

    fn try_from(id: &AlgorithmId) -> std::result::Result<Self, Self::Error> {
        let algorithm = to_object_identifier(id.oid())?;
        let parameters = match id.parameters() {
            Some(arcs) => {
                let param_oid = to_object_identifier(arcs)?;
                let encoded = ser::serialize(&param_oid).map_err(|e| Error::KeyEncoding(e.to_string()))?;
                Some(Any::new(encoded))
            }
            None => None,
        };
        Ok(Self { algorithm, parameters })
    }
}

impl TryFrom<AlgorithmIdentifier> for AlgorithmId {
    type Error = Error;

    fn try_from(asn: AlgorithmIdentifier) -> std::result::Result<Self, Self::Error> {
        let parameters = match asn.parameters {
            Some(any) if any.as_bytes() == ASN1_NULL => None,
            Some(any) => {
                let oid: ObjectIdentifier = ser::deserialize(any.as_bytes())
                    .map_err(|_| Error::KeyFormat("unsupported algorithm parameters".into()))?;
                Some(from_object_identifier(&oid))
            }
            None => None,
        };
        Ok(AlgorithmId::new(from_object_identifier(&asn.algorithm), parameters))
    }
}

/// Wrap raw private key bytes in a versioned container. The version is always
/// written as zero.
pub fn encode_private_key(raw_key: &[u8], algorithm: &AlgorithmId) -> Result<Vec<u8>> {
    let container = PrivateKeyContainer {
        version: 0,
        algorithm: AlgorithmIdentifier::try_from(algorithm)?,
        private_key: OctetString::copy_from_slice(raw_key),
    };
    ser::serialize(&container).map_err(|e| Error::KeyEncoding(e.to_string()))
}

/// Unwrap a private key container, returning the algorithm and the raw key
/// bytes.
pub fn decode_private_key(container: &[u8]) -> Result<(AlgorithmId, Zeroizing<Vec<u8>>)> {
    if container.first() != Some(&ASN1_SEQUENCE) {
        Err(Error::KeyFormat("invalid key format: outer structure is not a sequence".into()))?;
    }
    let raw: RawPrivateKeyContainer =
        ser::deserialize(container).map_err(|e| Error::KeyFormat(format!("invalid key format: {}", e)))?;
    let version = integer_content(raw.version.as_bytes())?;
    if version != [0x00] {
        Err(Error::KeyVersionMismatch(integer_to_string(version)))?;
    }
    let algorithm: AlgorithmIdentifier = ser::deserialize(raw.algorithm.as_bytes())
        .map_err(|e| Error::KeyFormat(format!("malformed algorithm identifier: {}", e)))?;
    let algorithm = AlgorithmId::try_from(algorithm)?;
    Ok((algorithm, Zeroizing::new(raw.private_key.to_vec())))
}

/// An EC public key, as a pair of affine coordinates.
///
/// Each coordinate is an unsigned big-endian integer, left-padded to the
/// curve's coordinate width.
#[derive(Debug, Clone, PartialEq, Eq, getset::Getters)]
#[getset(get = "pub")]
pub struct EcPublicKeyPoint {
    /// The curve this point lives on.
    curve: EcCurve,
    /// X coordinate (big-endian)
    x: Vec<u8>,
    /// Y coordinate (big-endian)
    y: Vec<u8>,
}

impl EcPublicKeyPoint {
    /// Re-encode as an uncompressed point (`0x04 || X || Y`).
    pub fn to_uncompressed(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(1 + self.x.len() + self.y.len());
        out.push(POINT_UNCOMPRESSED);
        out.extend_from_slice(&self.x);
        out.extend_from_slice(&self.y);
        out
    }

    /// Turn this point into a P-256 public key. Fails if the point is on some
    /// other curve, or isn't actually on the curve.
    pub fn to_p256(&self) -> Result<p256::PublicKey> {
        if self.curve != EcCurve::P256 {
            Err(Error::KeyFormat(format!("point is on {:?}, not P-256", self.curve)))?;
        }
        p256::PublicKey::from_sec1_bytes(&self.to_uncompressed())
            .map_err(|_| Error::KeyFormat("point is not on the P-256 curve".into()))
    }
}

/// Rebuild a public key from its raw uncompressed point encoding.
///
/// The input must be exactly `1 + 2 * L` bytes, where `L` is the curve's
/// coordinate width, and must start with the uncompressed marker `0x04`.
pub fn reconstruct_public_key(raw_point: &[u8], curve: EcCurve) -> Result<EcPublicKeyPoint> {
    let (marker, coords) = raw_point
        .split_first()
        .ok_or_else(|| Error::KeyFormat("empty public key point".into()))?;
    if *marker != POINT_UNCOMPRESSED {
        Err(Error::KeyFormat(format!("public key point is not uncompressed (marker {:#04x})", marker)))?;
    }
    let width = curve.coordinate_len();
    if coords.len() != width * 2 {
        Err(Error::KeyFormat(format!(
            "public key point has {} coordinate bytes, expected {}",
            coords.len(),
            width * 2
        )))?;
    }
    let (x, y) = coords.split_at(width);
    Ok(EcPublicKeyPoint {
        curve,
        x: x.to_vec(),
        y: y.to_vec(),
    })
}
