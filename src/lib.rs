//! A client core for certificate authorities that issue identities on a
//! permissioned ledger network, and for assembling the transactions those
//! identities sign.
//!
//! There are two halves here that share only the notion of a signing
//! credential (an [`Enrollment`](ca::Enrollment)):
//!
//! - [`ca`] talks to the CA over HTTP(S): registering identities, enrolling
//!   them (getting a certificate for a key), re-enrolling, revoking, pulling
//!   CRLs, and listing identities and affiliations.
//! - [`tx`] takes a proposal, the response payload its endorsers signed, and
//!   their endorsements, and assembles the envelope that gets submitted to the
//!   ledger. Transient data on the proposal never makes it into the envelope.
//!
//! Key material is handled by [`crypto`]: private keys go in and out of a
//! versioned binary container, public keys can be rebuilt from raw points, and
//! [`EnrollmentKey`](crypto::key::EnrollmentKey) does the actual signing.
//!
//! Everything is synchronous. The CA client holds no per-call state and never
//! retries; retry policy belongs to the caller.

pub mod error;
pub mod util;
pub mod crypto;
pub mod ca;
pub mod tx;
