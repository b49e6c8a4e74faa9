//! Proposals and their headers.
//!
//! Headers are carried around as serialized bytes (that's what gets signed
//! and hashed downstream), with helpers to parse them back into their
//! structured form.

use crate::{
    ca::Enrollment,
    error::{Error, Result},
    util::{ser::SerdeBinary, Canonical, Timestamp},
};
use rand::{CryptoRng, RngCore};
use rasn::{types::OctetString, AsnType, Decode, Encode};
use sha2::{Digest, Sha256};

/// How many random bytes go into a nonce.
pub const NONCE_LEN: usize = 24;

/// The header type of a transaction that went through endorsement.
pub const HEADER_TYPE_ENDORSER_TRANSACTION: u32 = 3;

/// Describes which group (channel) a transaction is for and when it was made.
#[derive(Debug, Clone, PartialEq, AsnType, Encode, Decode, getset::Getters)]
#[getset(get = "pub")]
pub struct GroupHeader {
    #[rasn(tag(explicit(0)))]
    header_type: u32,
    #[rasn(tag(explicit(1)))]
    group_id: String,
    #[rasn(tag(explicit(2)))]
    tx_id: String,
    /// Milliseconds since the unix epoch.
    #[rasn(tag(explicit(3)))]
    timestamp: i64,
    #[rasn(tag(explicit(4)))]
    epoch: u64,
}

impl GroupHeader {
    pub fn new<G: Into<String>, T: Into<String>>(header_type: u32, group_id: G, tx_id: T, timestamp: &Timestamp, epoch: u64) -> Self {
        Self {
            header_type,
            group_id: group_id.into(),
            tx_id: tx_id.into(),
            timestamp: timestamp.millis(),
            epoch,
        }
    }
}

impl SerdeBinary for GroupHeader {}

/// Who made a proposal, plus the nonce that makes it unique.
#[derive(Debug, Clone, PartialEq, AsnType, Encode, Decode, getset::Getters)]
#[getset(get = "pub")]
pub struct SignatureHeader {
    /// The creator's serialized identity (generally their certificate).
    #[rasn(tag(explicit(0)))]
    creator: OctetString,
    #[rasn(tag(explicit(1)))]
    nonce: OctetString,
}

impl SignatureHeader {
    pub fn new(creator: Vec<u8>, nonce: Vec<u8>) -> Self {
        Self {
            creator: creator.into(),
            nonce: nonce.into(),
        }
    }
}

impl SerdeBinary for SignatureHeader {}

/// A proposal header: a serialized [`GroupHeader`] and a serialized
/// [`SignatureHeader`].
#[derive(Debug, Clone, PartialEq, AsnType, Encode, Decode, getset::Getters)]
#[getset(get = "pub")]
pub struct Header {
    #[rasn(tag(explicit(0)))]
    group_header: OctetString,
    #[rasn(tag(explicit(1)))]
    signature_header: OctetString,
}

impl Header {
    pub fn new(group_header: &GroupHeader, signature_header: &SignatureHeader) -> Result<Self> {
        Ok(Self {
            group_header: group_header.serialize_binary()?.into(),
            signature_header: signature_header.serialize_binary()?.into(),
        })
    }

    pub fn parse_group_header(&self) -> Result<GroupHeader> {
        GroupHeader::deserialize_binary(&self.group_header[..])
    }

    pub fn parse_signature_header(&self) -> Result<SignatureHeader> {
        SignatureHeader::deserialize_binary(&self.signature_header[..])
    }
}

impl SerdeBinary for Header {}

/// A single piece of transient data: passed along to the endorsers, never
/// written to the ledger.
#[derive(Debug, Clone, PartialEq, AsnType, Encode, Decode, getset::Getters)]
#[getset(get = "pub")]
pub struct TransientEntry {
    #[rasn(tag(explicit(0)))]
    key: String,
    #[rasn(tag(explicit(1)))]
    value: OctetString,
}

impl TransientEntry {
    pub fn new<K: Into<String>>(key: K, value: Vec<u8>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }
}

impl SerdeBinary for TransientEntry {}

/// What the proposal asks to be run, plus any transient data that goes along
/// with it.
#[derive(Debug, Clone, PartialEq, AsnType, Encode, Decode, getset::Getters)]
#[getset(get = "pub")]
pub struct ProposalPayload {
    /// The serialized invocation.
    #[rasn(tag(explicit(0)))]
    input: OctetString,
    /// Kept in insertion order, keys unique.
    #[rasn(tag(explicit(1)))]
    transient: Vec<TransientEntry>,
}

impl ProposalPayload {
    /// Create a payload. Later duplicate transient keys replace earlier ones.
    pub fn new(input: Vec<u8>, transient: Vec<TransientEntry>) -> Self {
        let mut deduped: Vec<TransientEntry> = Vec::with_capacity(transient.len());
        for entry in transient {
            match deduped.iter_mut().find(|e| e.key == entry.key) {
                Some(existing) => *existing = entry,
                None => deduped.push(entry),
            }
        }
        Self {
            input: input.into(),
            transient: deduped,
        }
    }

    /// Look up a transient value by key.
    pub fn transient_value(&self, key: &str) -> Option<&[u8]> {
        self.transient.iter().find(|e| e.key == key).map(|e| &e.value[..])
    }
}

impl Canonical for ProposalPayload {
    fn canonical(&self) -> Self {
        Self {
            input: self.input.clone(),
            transient: Vec::new(),
        }
    }

    fn has_transient(&self) -> bool {
        !self.transient.is_empty()
    }
}

impl SerdeBinary for ProposalPayload {}

/// A proposal, as sent out for endorsement: a serialized [`Header`] and a
/// serialized [`ProposalPayload`].
#[derive(Debug, Clone, PartialEq, AsnType, Encode, Decode, getset::Getters)]
#[getset(get = "pub")]
pub struct Proposal {
    #[rasn(tag(explicit(0)))]
    header: OctetString,
    #[rasn(tag(explicit(1)))]
    payload: OctetString,
}

impl Proposal {
    pub fn new(header: &Header, payload: &ProposalPayload) -> Result<Self> {
        Ok(Self {
            header: header.serialize_binary()?.into(),
            payload: payload.serialize_binary()?.into(),
        })
    }

    /// Build a proposal straight from already-serialized parts.
    pub fn from_parts(header: Vec<u8>, payload: Vec<u8>) -> Self {
        Self {
            header: header.into(),
            payload: payload.into(),
        }
    }

    pub fn parse_header(&self) -> Result<Header> {
        Header::deserialize_binary(&self.header[..])
    }

    pub fn parse_payload(&self) -> Result<ProposalPayload> {
        ProposalPayload::deserialize_binary(&self.payload[..])
    }
}

impl SerdeBinary for Proposal {}

/// Everything that identifies one transaction: who is making it, for which
/// group, its nonce and the transaction id derived from them.
#[derive(Debug, Clone, PartialEq, getset::Getters)]
#[getset(get = "pub")]
pub struct TransactionContext {
    group_id: String,
    creator: Vec<u8>,
    nonce: Vec<u8>,
    tx_id: String,
    timestamp: Timestamp,
}

impl TransactionContext {
    /// Create a new context with a fresh nonce.
    pub fn new<R, G>(rng: &mut R, group_id: G, creator: Vec<u8>, timestamp: Timestamp) -> Result<Self>
    where
        R: RngCore + CryptoRng,
        G: Into<String>,
    {
        let group_id = group_id.into();
        if group_id.trim().is_empty() {
            Err(Error::InvalidArgument("group id cannot be empty".into()))?;
        }
        if creator.is_empty() {
            Err(Error::InvalidArgument("creator cannot be empty".into()))?;
        }
        let mut nonce = vec![0u8; NONCE_LEN];
        rng.fill_bytes(&mut nonce);
        let tx_id = Self::compute_tx_id(&nonce, &creator);
        Ok(Self {
            group_id,
            creator,
            nonce,
            tx_id,
            timestamp,
        })
    }

    /// Create a context where the creator is the enrollment's certificate.
    pub fn from_enrollment<R, G>(rng: &mut R, group_id: G, enrollment: &Enrollment) -> Result<Self>
    where
        R: RngCore + CryptoRng,
        G: Into<String>,
    {
        Self::new(rng, group_id, enrollment.cert().as_bytes().to_vec(), Timestamp::now())
    }

    /// `hex(sha256(nonce || creator))`
    pub fn compute_tx_id(nonce: &[u8], creator: &[u8]) -> String {
        let mut hasher = Sha256::new();
        hasher.update(nonce);
        hasher.update(creator);
        hex::encode(hasher.finalize())
    }

    pub fn signature_header(&self) -> SignatureHeader {
        SignatureHeader::new(self.creator.clone(), self.nonce.clone())
    }

    pub fn group_header(&self, header_type: u32) -> GroupHeader {
        GroupHeader::new(header_type, self.group_id.clone(), self.tx_id.clone(), &self.timestamp, 0)
    }

    /// The header of an endorser transaction made in this context.
    pub fn header(&self) -> Result<Header> {
        Header::new(&self.group_header(HEADER_TYPE_ENDORSER_TRANSACTION), &self.signature_header())
    }

    /// Wrap a payload into a proposal made in this context.
    pub fn proposal(&self, payload: &ProposalPayload) -> Result<Proposal> {
        Proposal::new(&self.header()?, payload)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::util::test;
    use std::str::FromStr;

    fn context() -> TransactionContext {
        let ts = Timestamp::from_str("2027-03-04T05:06:07.890Z").unwrap();
        TransactionContext::new(&mut test::rng(), "mychannel", b"creator cert".to_vec(), ts).unwrap()
    }

    #[test]
    fn context_tx_id() {
        let ctx = context();
        assert_eq!(ctx.nonce().len(), NONCE_LEN);
        let mut hasher = Sha256::new();
        hasher.update(ctx.nonce());
        hasher.update(b"creator cert");
        assert_eq!(ctx.tx_id(), &hex::encode(hasher.finalize()));
        assert_eq!(ctx.tx_id().len(), 64);

        let ctx2 = TransactionContext::new(&mut test::rng_seeded(b"other"), "mychannel", b"creator cert".to_vec(), Timestamp::now()).unwrap();
        assert_ne!(ctx.nonce(), ctx2.nonce());
        assert_ne!(ctx.tx_id(), ctx2.tx_id());
    }

    #[test]
    fn context_validates() {
        let res = TransactionContext::new(&mut test::rng(), " ", b"creator".to_vec(), Timestamp::now());
        assert!(matches!(res, Err(Error::InvalidArgument(_))));
        let res = TransactionContext::new(&mut test::rng(), "mychannel", Vec::new(), Timestamp::now());
        assert!(matches!(res, Err(Error::InvalidArgument(_))));
    }

    #[test]
    fn header_parses_back() {
        let ctx = context();
        let header = ctx.header().unwrap();
        let group = header.parse_group_header().unwrap();
        assert_eq!(group.header_type(), &HEADER_TYPE_ENDORSER_TRANSACTION);
        assert_eq!(group.group_id(), "mychannel");
        assert_eq!(group.tx_id(), ctx.tx_id());
        assert_eq!(group.timestamp(), &ctx.timestamp().millis());
        let sig = header.parse_signature_header().unwrap();
        assert_eq!(&sig.creator()[..], b"creator cert");
        assert_eq!(&sig.nonce()[..], &ctx.nonce()[..]);

        let bytes = header.serialize_binary().unwrap();
        assert_eq!(Header::deserialize_binary(&bytes).unwrap(), header);
    }

    #[test]
    fn payload_transient() {
        let payload = ProposalPayload::new(
            b"invoke".to_vec(),
            vec![
                TransientEntry::new("k", b"v".to_vec()),
                TransientEntry::new("other", b"x".to_vec()),
                TransientEntry::new("k", b"v2".to_vec()),
            ],
        );
        assert_eq!(payload.transient().len(), 2);
        assert_eq!(payload.transient_value("k"), Some(&b"v2"[..]));
        assert!(payload.has_transient());

        let canonical = payload.canonical();
        assert!(!canonical.has_transient());
        assert_eq!(canonical.input(), payload.input());
        // the original keeps its transient data
        assert_eq!(payload.transient().len(), 2);
    }

    #[test]
    fn proposal_parts() {
        let ctx = context();
        let payload = ProposalPayload::new(b"invoke".to_vec(), vec![]);
        let proposal = ctx.proposal(&payload).unwrap();
        assert_eq!(proposal.parse_header().unwrap(), ctx.header().unwrap());
        assert_eq!(proposal.parse_payload().unwrap(), payload);

        let garbage = Proposal::from_parts(vec![1, 2, 3], vec![4, 5, 6]);
        assert!(garbage.parse_header().is_err());
        assert!(garbage.parse_payload().is_err());
    }
}
