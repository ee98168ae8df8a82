//! Well-known seeds for deterministic sandbox accounts.
//!
//! These seeds are public. Keys derived from them must only ever hold value on
//! a sandbox network; the wallet refuses to derive them anywhere else.

use crate::hash::blake2b_256_multi;

/// Number of entries in the sandbox seed table.
pub const SANDBOX_SEED_COUNT: usize = 10;

const SANDBOX_SEED_DOMAIN: &[u8] = b"kin-sandbox-seed-v1";

/// The seed for sandbox account `index`, or `None` past the end of the table.
pub fn sandbox_seed(index: usize) -> Option<[u8; 32]> {
    if index >= SANDBOX_SEED_COUNT {
        return None;
    }
    let index_bytes = (index as u32).to_le_bytes();
    Some(blake2b_256_multi(&[SANDBOX_SEED_DOMAIN, &index_bytes]))
}
