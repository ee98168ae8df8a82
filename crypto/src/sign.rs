//! Ed25519 message signing and verification.

use ed25519_dalek::{Signer, SigningKey, VerifyingKey};
use kin_types::{PrivateKey, PublicKey, Signature};

/// Sign a message with a private key.
pub fn sign_message(message: &[u8], private_key: &PrivateKey) -> Signature {
    let signing_key = SigningKey::from_bytes(&private_key.0);
    Signature(signing_key.sign(message).to_bytes())
}

/// Verify a signature against a message and public key.
///
/// Uses strict verification, so non-canonical signatures are rejected.
pub fn verify_signature(message: &[u8], signature: &Signature, public_key: &PublicKey) -> bool {
    let Ok(verifying_key) = VerifyingKey::from_bytes(&public_key.0) else {
        return false;
    };
    let dalek_sig = ed25519_dalek::Signature::from_bytes(&signature.0);
    verifying_key.verify_strict(message, &dalek_sig).is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keys::{generate_keypair, keypair_from_seed};

    #[test]
    fn sign_and_verify() {
        let kp = generate_keypair();
        let sig = sign_message(b"transfer 5 kin", &kp.private);
        assert!(verify_signature(b"transfer 5 kin", &sig, &kp.public));
    }

    #[test]
    fn tampered_message_fails() {
        let kp = generate_keypair();
        let sig = sign_message(b"transfer 5 kin", &kp.private);
        assert!(!verify_signature(b"transfer 6 kin", &sig, &kp.public));
    }

    #[test]
    fn wrong_key_fails() {
        let kp1 = generate_keypair();
        let kp2 = generate_keypair();
        let sig = sign_message(b"msg", &kp1.private);
        assert!(!verify_signature(b"msg", &sig, &kp2.public));
    }

    #[test]
    fn signature_is_deterministic() {
        let kp = keypair_from_seed(&[9u8; 32]);
        assert_eq!(sign_message(b"x", &kp.private), sign_message(b"x", &kp.private));
    }

    #[test]
    fn invalid_public_key_fails() {
        let kp = generate_keypair();
        let sig = sign_message(b"msg", &kp.private);
        assert!(!verify_signature(b"msg", &sig, &PublicKey([0xFF; 32])));
    }
}
