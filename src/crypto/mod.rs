//! The crypto module holds the key material side of things: encoding private
//! keys into their binary container, rebuilding public keys from raw points,
//! and the signing keys enrollments are made of.
//!
//! The algorithms themselves come from RustCrypto; nothing in here implements
//! any cryptography.

pub mod codec;
pub mod key;

use rand::{rngs::OsRng, RngCore, SeedableRng};

/// A convenience function that returns a ChaCha20 CSRNG seeded with OS random bytes. Use this if
/// you want a nice, strong random number generator and don't want to wire one up yourself.
///
/// This can be used as an input to any function here that accepts `&mut rng`. Otherwise, you can
/// bring your own RNG that implements [`RngCore`] and [`rand::CryptoRng`].
pub fn rng_chacha20() -> rand_chacha::ChaCha20Rng {
    let mut seed_bytes = [0u8; 32];
    OsRng.fill_bytes(&mut seed_bytes);
    rand_chacha::ChaCha20Rng::from_seed(seed_bytes)
}
