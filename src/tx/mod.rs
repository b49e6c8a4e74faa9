//! Transactions. A client builds a proposal (header + payload), collects
//! endorsements for it from the network, and then assembles everything into
//! an envelope that gets handed off for submission.
//!
//! Nothing in here does any I/O. Every structure is DER-encoded via `rasn` and
//! can be (de)serialized with [`SerdeBinary`](crate::util::ser::SerdeBinary).

pub mod proposal;
pub mod transaction;

pub use crate::tx::{
    proposal::{GroupHeader, Header, Proposal, ProposalPayload, SignatureHeader, TransactionContext, TransientEntry},
    transaction::{
        assemble, ActionPayload, EndorsedAction, Endorsement, SignedEnvelope, Transaction, TransactionAction,
        TransactionEnvelope,
    },
};
