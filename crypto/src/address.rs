//! Account address derivation from public keys.

use kin_types::{Address, PublicKey};

/// Derive the account address for a public key.
///
/// The address is the last 20 bytes of Blake2b-256(public_key).
pub fn derive_address(public_key: &PublicKey) -> Address {
    let hash = crate::blake2b_256(public_key.as_bytes());
    let mut bytes = [0u8; Address::LEN];
    bytes.copy_from_slice(&hash[32 - Address::LEN..]);
    Address::from_bytes(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keys::{generate_keypair, keypair_from_seed};

    #[test]
    fn derive_is_deterministic() {
        let kp = keypair_from_seed(&[7u8; 32]);
        assert_eq!(derive_address(&kp.public), derive_address(&kp.public));
    }

    #[test]
    fn different_keys_different_addresses() {
        let a = derive_address(&generate_keypair().public);
        let b = derive_address(&generate_keypair().public);
        assert_ne!(a, b);
    }

    #[test]
    fn derived_address_text_parses_back() {
        let addr = derive_address(&generate_keypair().public);
        assert_eq!(Address::parse(&addr.to_string()).unwrap(), addr);
    }
}
