//! Turning an endorsed proposal into a transaction envelope.
//!
//! The envelope is built bottom-up: the endorsements and the response they
//! sign go into an [`EndorsedAction`], which is paired with the proposal
//! payload (transient data stripped) in an [`ActionPayload`], which becomes
//! the single [`TransactionAction`] of a [`Transaction`], which is wrapped up
//! with the proposal's header in a [`TransactionEnvelope`].

use crate::{
    crypto::key::Signer,
    error::{Error, Result},
    tx::proposal::{Header, Proposal, ProposalPayload},
    util::{ser::SerdeBinary, Canonical},
};
use rasn::{types::OctetString, AsnType, Decode, Encode};
use tracing::{debug, error};

/// A network participant's signed approval of a proposal's result.
#[derive(Debug, Clone, PartialEq, AsnType, Encode, Decode, getset::Getters)]
#[getset(get = "pub")]
pub struct Endorsement {
    /// The endorser's serialized identity.
    #[rasn(tag(explicit(0)))]
    endorser: OctetString,
    #[rasn(tag(explicit(1)))]
    signature: OctetString,
}

impl SerdeBinary for Endorsement {}

impl Endorsement {
    pub fn new(endorser: Vec<u8>, signature: Vec<u8>) -> Self {
        Self {
            endorser: endorser.into(),
            signature: signature.into(),
        }
    }
}

/// The response payload the endorsers signed, and their endorsements.
#[derive(Debug, Clone, PartialEq, AsnType, Encode, Decode, getset::Getters)]
#[getset(get = "pub")]
pub struct EndorsedAction {
    #[rasn(tag(explicit(0)))]
    response_payload: OctetString,
    /// In the order they were collected.
    #[rasn(tag(explicit(1)))]
    endorsements: Vec<Endorsement>,
}

impl EndorsedAction {
    pub fn new(response_payload: &[u8], endorsements: &[Endorsement]) -> Self {
        Self {
            response_payload: OctetString::copy_from_slice(response_payload),
            endorsements: endorsements.to_vec(),
        }
    }
}

impl SerdeBinary for EndorsedAction {}

/// The canonical proposal payload together with the endorsed action.
#[derive(Debug, Clone, PartialEq, AsnType, Encode, Decode, getset::Getters)]
#[getset(get = "pub")]
pub struct ActionPayload {
    /// A serialized [`ProposalPayload`] with no transient data.
    #[rasn(tag(explicit(0)))]
    proposal_payload: OctetString,
    #[rasn(tag(explicit(1)))]
    action: EndorsedAction,
}

impl ActionPayload {
    pub fn parse_proposal_payload(&self) -> Result<ProposalPayload> {
        ProposalPayload::deserialize_binary(&self.proposal_payload[..])
    }
}

impl SerdeBinary for ActionPayload {}

#[derive(Debug, Clone, PartialEq, AsnType, Encode, Decode, getset::Getters)]
#[getset(get = "pub")]
pub struct TransactionAction {
    /// The proposal's serialized signature header.
    #[rasn(tag(explicit(0)))]
    header: OctetString,
    /// A serialized [`ActionPayload`].
    #[rasn(tag(explicit(1)))]
    payload: OctetString,
}

impl TransactionAction {
    pub fn parse_payload(&self) -> Result<ActionPayload> {
        ActionPayload::deserialize_binary(&self.payload[..])
    }
}

impl SerdeBinary for TransactionAction {}

#[derive(Debug, Clone, PartialEq, AsnType, Encode, Decode, getset::Getters)]
#[getset(get = "pub")]
pub struct Transaction {
    #[rasn(tag(explicit(0)))]
    actions: Vec<TransactionAction>,
}

impl SerdeBinary for Transaction {}

/// The finished product: the proposal's header and the serialized
/// [`Transaction`].
#[derive(Debug, Clone, PartialEq, AsnType, Encode, Decode, getset::Getters)]
#[getset(get = "pub")]
pub struct TransactionEnvelope {
    #[rasn(tag(explicit(0)))]
    header: Header,
    #[rasn(tag(explicit(1)))]
    data: OctetString,
}

impl TransactionEnvelope {
    pub fn parse_transaction(&self) -> Result<Transaction> {
        Transaction::deserialize_binary(&self.data[..])
    }

    /// Serialize this envelope and sign the result.
    pub fn sign<S: Signer + ?Sized>(&self, signer: &S) -> Result<SignedEnvelope> {
        let payload = self.serialize_binary()?;
        let signature = signer.sign(&payload)?;
        Ok(SignedEnvelope {
            payload: payload.into(),
            signature: signature.into(),
        })
    }
}

impl SerdeBinary for TransactionEnvelope {}

/// A serialized [`TransactionEnvelope`] and the creator's signature over it.
/// This is what gets submitted.
#[derive(Debug, Clone, PartialEq, AsnType, Encode, Decode, getset::Getters)]
#[getset(get = "pub")]
pub struct SignedEnvelope {
    #[rasn(tag(explicit(0)))]
    payload: OctetString,
    #[rasn(tag(explicit(1)))]
    signature: OctetString,
}

impl SignedEnvelope {
    pub fn parse_envelope(&self) -> Result<TransactionEnvelope> {
        TransactionEnvelope::deserialize_binary(&self.payload[..])
    }
}

impl SerdeBinary for SignedEnvelope {}

fn build(proposal: &Proposal, response_payload: &[u8], endorsements: &[Endorsement]) -> Result<TransactionEnvelope> {
    let header = proposal.parse_header()?;
    // the signature header has to be readable, even though we pass it on as-is
    header.parse_signature_header()?;
    let action = EndorsedAction::new(response_payload, endorsements);
    let payload = proposal.parse_payload()?.canonical();
    let action_payload = ActionPayload {
        proposal_payload: payload.serialize_binary()?.into(),
        action,
    };
    let tx = Transaction {
        actions: vec![TransactionAction {
            header: header.signature_header().clone(),
            payload: action_payload.serialize_binary()?.into(),
        }],
    };
    Ok(TransactionEnvelope {
        header,
        data: tx.serialize_binary()?.into(),
    })
}

/// Assemble an endorsed proposal into a transaction envelope.
///
/// The proposal is never modified. Its transient data is stripped from a copy
/// of the payload and never makes it into the envelope. Endorsements are kept
/// exactly as given: same order, duplicates and all.
pub fn assemble(proposal: &Proposal, response_payload: &[u8], endorsements: &[Endorsement]) -> Result<TransactionEnvelope> {
    debug!("assembling transaction with {} endorsements", endorsements.len());
    build(proposal, response_payload, endorsements).map_err(|e| {
        error!("transaction assembly failed: {}", e);
        Error::assembly("could not assemble transaction from proposal", e)
    })
}
