//! # Ed25519 Signatures
//!
//! Deterministic signatures over canonical bytes. Keys and signatures cross
//! this boundary as hex newtypes.

use ed25519_dalek::{Signer, Verifier, VerifyingKey};
use serde::Serialize;
use shared_types::{AccountNumber, KeyPair, Signature, SigningKey};

use crate::{canonical_bytes, CryptoError};

fn dalek_key(signing_key: &SigningKey) -> Result<ed25519_dalek::SigningKey, CryptoError> {
    let seed = signing_key
        .to_bytes()
        .map_err(CryptoError::InvalidPrivateKey)?;
    Ok(ed25519_dalek::SigningKey::from_bytes(&seed))
}

/// Account number (public key) for a signing key.
pub fn derive_public_key(signing_key: &SigningKey) -> Result<AccountNumber, CryptoError> {
    let key = dalek_key(signing_key)?;
    Ok(AccountNumber::from_bytes(&key.verifying_key().to_bytes()))
}

/// Sign raw bytes.
pub fn sign(message: &[u8], signing_key: &SigningKey) -> Result<Signature, CryptoError> {
    let key = dalek_key(signing_key)?;
    Ok(Signature::from_bytes(&key.sign(message).to_bytes()))
}

/// Verify a signature. Malformed keys or signatures verify as `false`.
pub fn verify(public_key: &AccountNumber, message: &[u8], signature: &Signature) -> bool {
    let Ok(key_bytes) = public_key.to_bytes() else {
        return false;
    };
    let Ok(signature_bytes) = signature.to_bytes() else {
        return false;
    };
    let Ok(verifying_key) = VerifyingKey::from_bytes(&key_bytes) else {
        return false;
    };
    let signature = ed25519_dalek::Signature::from_bytes(&signature_bytes);
    verifying_key.verify(message, &signature).is_ok()
}

/// Sign the canonical bytes of a value.
pub fn sign_value<T: Serialize + ?Sized>(
    value: &T,
    signing_key: &SigningKey,
) -> Result<Signature, CryptoError> {
    sign(&canonical_bytes(value)?, signing_key)
}

/// Verify a signature over the canonical bytes of a value.
pub fn verify_value<T: Serialize + ?Sized>(
    public_key: &AccountNumber,
    value: &T,
    signature: &Signature,
) -> bool {
    match canonical_bytes(value) {
        Ok(bytes) => verify(public_key, &bytes, signature),
        Err(_) => false,
    }
}

/// Generate a random key pair.
pub fn generate_key_pair() -> KeyPair {
    let key = ed25519_dalek::SigningKey::generate(&mut rand::thread_rng());
    KeyPair {
        public: AccountNumber::from_bytes(&key.verifying_key().to_bytes()),
        private: SigningKey::from_bytes(&key.to_bytes()),
    }
}
