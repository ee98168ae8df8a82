//! Cryptographic primitives for the Kin wallet core.
//!
//! - **Ed25519** for signing and signature verification
//! - **Blake2b** for hashing (transfer handles, address derivation)
//! - Address derivation: last 20 bytes of Blake2b-256(public key)
//! - The public sandbox seed table used for deterministic test accounts

pub mod address;
pub mod hash;
pub mod keys;
pub mod sandbox;
pub mod sign;

pub use address::derive_address;
pub use hash::{blake2b_256, blake2b_256_multi, hash_transfer};
pub use keys::{generate_keypair, keypair_from_private, keypair_from_seed, public_from_private};
pub use sandbox::{sandbox_seed, SANDBOX_SEED_COUNT};
pub use sign::{sign_message, verify_signature};
