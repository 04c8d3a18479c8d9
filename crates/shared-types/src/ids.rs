//! # Hex-String Identifiers
//!
//! Account numbers, signing keys, hashes and signatures travel as lowercase
//! hexadecimal strings. Each kind is a validated newtype so a 64-char hash can
//! never be passed where a 128-char signature is expected.
//!
//! | Type | Length | Meaning |
//! |------|--------|---------|
//! | `AccountNumber` | 64 | Ed25519 public key, also the node identifier |
//! | `SigningKey` | 64 | Ed25519 secret seed |
//! | `Hash` | 64 | SHA3-256 digest |
//! | `AccountLock` | 64 | Per-account nonce (a hash or the account number) |
//! | `BlockIdentifier` | 64 | Hash binding a block to its predecessor |
//! | `Signature` | 128 | Ed25519 signature |

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::errors::HexStringError;

fn validate_hex(value: &str, expected: usize) -> Result<(), HexStringError> {
    if value.len() != expected {
        return Err(HexStringError::WrongLength {
            expected,
            actual: value.len(),
        });
    }
    if !value.bytes().all(|b| matches!(b, b'0'..=b'9' | b'a'..=b'f')) {
        return Err(HexStringError::NotLowercaseHex);
    }
    Ok(())
}

macro_rules! hex_string {
    ($(#[$meta:meta])* $name:ident, $len:expr) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(try_from = "String", into = "String")]
        pub struct $name(String);

        impl $name {
            /// Number of hex characters.
            pub const LENGTH: usize = $len;

            /// Build from raw bytes.
            pub fn from_bytes(bytes: &[u8; $len / 2]) -> Self {
                Self(hex::encode(bytes))
            }

            /// Decode into raw bytes.
            pub fn to_bytes(&self) -> Result<[u8; $len / 2], HexStringError> {
                let mut out = [0u8; $len / 2];
                hex::decode_to_slice(&self.0, &mut out)
                    .map_err(|_| HexStringError::NotLowercaseHex)?;
                Ok(out)
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl TryFrom<String> for $name {
            type Error = HexStringError;

            fn try_from(value: String) -> Result<Self, Self::Error> {
                validate_hex(&value, $len)?;
                Ok(Self(value))
            }
        }

        impl FromStr for $name {
            type Err = HexStringError;

            fn from_str(value: &str) -> Result<Self, Self::Err> {
                Self::try_from(value.to_owned())
            }
        }

        impl From<$name> for String {
            fn from(value: $name) -> String {
                value.0
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }
    };
}

hex_string!(
    /// Account number: the hex-encoded Ed25519 public key of an account.
    AccountNumber,
    64
);
hex_string!(
    /// Hex-encoded Ed25519 secret seed.
    SigningKey,
    64
);
hex_string!(
    /// Hex-encoded SHA3-256 digest.
    Hash,
    64
);
hex_string!(
    /// Per-account replay-prevention nonce.
    AccountLock,
    64
);
hex_string!(
    /// Hash of the previous block message.
    BlockIdentifier,
    64
);
hex_string!(
    /// Hex-encoded Ed25519 signature.
    Signature,
    128
);

impl From<AccountNumber> for AccountLock {
    /// An account's initial lock is its own number.
    fn from(value: AccountNumber) -> Self {
        Self(value.0)
    }
}

impl From<Hash> for AccountLock {
    fn from(value: Hash) -> Self {
        Self(value.0)
    }
}

impl From<Hash> for BlockIdentifier {
    fn from(value: Hash) -> Self {
        Self(value.0)
    }
}

/// A public/private key pair in hex form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyPair {
    pub public: AccountNumber,
    pub private: SigningKey,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_accepts_lowercase_hex() {
        let value = "ab".repeat(32);
        let number: AccountNumber = value.parse().unwrap();
        assert_eq!(number.as_str(), value);
    }

    #[test]
    fn test_rejects_wrong_length() {
        let err = Hash::from_str("abcd").unwrap_err();
        assert_eq!(
            err,
            HexStringError::WrongLength {
                expected: 64,
                actual: 4
            }
        );
    }

    #[test]
    fn test_rejects_uppercase() {
        let err = AccountNumber::from_str(&"AB".repeat(32)).unwrap_err();
        assert_eq!(err, HexStringError::NotLowercaseHex);
    }

    #[test]
    fn test_signature_length() {
        assert!(Signature::from_str(&"0".repeat(128)).is_ok());
        assert!(Signature::from_str(&"0".repeat(64)).is_err());
    }

    #[test]
    fn test_bytes_roundtrip() {
        let hash = Hash::from_bytes(&[0xAB; 32]);
        assert_eq!(hash.as_str(), "ab".repeat(32));
        assert_eq!(hash.to_bytes().unwrap(), [0xAB; 32]);
    }

    #[test]
    fn test_serde_rejects_invalid() {
        let result: Result<AccountNumber, _> = serde_json::from_str("\"xyz\"");
        assert!(result.is_err());

        let json = format!("\"{}\"", "1".repeat(64));
        let number: AccountNumber = serde_json::from_str(&json).unwrap();
        assert_eq!(serde_json::to_string(&number).unwrap(), json);
    }

    #[test]
    fn test_initial_lock_is_account_number() {
        let number = AccountNumber::from_bytes(&[7; 32]);
        let lock = AccountLock::from(number.clone());
        assert_eq!(lock.as_str(), number.as_str());
    }
}
