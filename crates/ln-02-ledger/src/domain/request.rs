//! # Signed Change Requests
//!
//! A request message is `{account_lock, type, ...variant fields}`; the signed
//! wrapper is `{signer, signature, message}`. The `type` tag selects the
//! variant through a `match` over the closed [`Type`] enum.

use std::collections::BTreeMap;

use serde::de::{self, Deserializer};
use serde::ser::{SerializeMap, Serializer};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use shared_crypto::{derive_public_key, hash_value, sign_value, verify_value};
use shared_types::{
    AccountLock, AccountNumber, Hash, NodeDeclaration, Signature, SigningKey, Type,
    ValidationError,
};

use super::parse::{self, join};
use super::validation::Validatable;
use super::{LedgerError, LedgerResult};
use crate::ports::LedgerReader;

/// Entry of the genesis account root file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlphaAccount {
    pub balance: u64,
    pub balance_lock: AccountLock,
}

/// Variant-specific request fields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RequestPayload {
    /// Seeds the ledger. Only valid on an empty ledger.
    Genesis {
        accounts: BTreeMap<AccountNumber, AlphaAccount>,
    },
    /// Registers or updates the signer's node.
    NodeDeclaration { node: NodeDeclaration },
}

impl RequestPayload {
    pub fn request_type(&self) -> Type {
        match self {
            RequestPayload::Genesis { .. } => Type::Genesis,
            RequestPayload::NodeDeclaration { .. } => Type::NodeDeclaration,
        }
    }

    fn field_names(request_type: Type) -> &'static [&'static str] {
        match request_type {
            Type::Genesis => &["accounts"],
            Type::NodeDeclaration => &["node"],
        }
    }

    fn from_object(
        request_type: Type,
        object: &serde_json::Map<String, Value>,
        path: &str,
        errors: &mut ValidationError,
    ) -> Option<Self> {
        match request_type {
            Type::Genesis => alpha_accounts(object, path, errors)
                .map(|accounts| RequestPayload::Genesis { accounts }),
            Type::NodeDeclaration => node_declaration(object, path, errors)
                .map(|node| RequestPayload::NodeDeclaration { node }),
        }
    }
}

/// `object[name]` as a nested object, recording a missing or non-object value.
fn nested<'a>(
    object: &'a serde_json::Map<String, Value>,
    path: &str,
    name: &str,
    errors: &mut ValidationError,
) -> Option<(&'a serde_json::Map<String, Value>, String)> {
    let path = join(path, name);
    let Some(value) = object.get(name) else {
        errors.push(path, parse::REQUIRED);
        return None;
    };
    match parse::object(value, &path) {
        Ok(nested) => Some((nested, path)),
        Err(err) => {
            errors.merge(err);
            None
        }
    }
}

fn node_declaration(
    object: &serde_json::Map<String, Value>,
    path: &str,
    errors: &mut ValidationError,
) -> Option<NodeDeclaration> {
    let (node, path) = nested(object, path, "node", errors)?;
    parse::reject_unknown(node, &path, &["addresses", "fee"], errors);
    let addresses = parse::field(node, &path, "addresses", errors);
    let fee = parse::field(node, &path, "fee", errors);
    Some(NodeDeclaration {
        addresses: addresses?,
        fee: fee?,
    })
}

fn alpha_accounts(
    object: &serde_json::Map<String, Value>,
    path: &str,
    errors: &mut ValidationError,
) -> Option<BTreeMap<AccountNumber, AlphaAccount>> {
    let (entries, path) = nested(object, path, "accounts", errors)?;
    let mut accounts = BTreeMap::new();
    let mut complete = true;
    for (key, value) in entries {
        let entry_path = join(&path, key);
        let number = match serde_json::from_value::<AccountNumber>(Value::String(key.clone())) {
            Ok(number) => Some(number),
            Err(err) => {
                errors.push(entry_path.clone(), err.to_string());
                None
            }
        };
        let account = match parse::object(value, &entry_path) {
            Ok(account) => {
                parse::reject_unknown(account, &entry_path, &["balance", "balance_lock"], errors);
                let balance = parse::field(account, &entry_path, "balance", errors);
                let balance_lock = parse::field(account, &entry_path, "balance_lock", errors);
                balance
                    .zip(balance_lock)
                    .map(|(balance, balance_lock)| AlphaAccount {
                        balance,
                        balance_lock,
                    })
            }
            Err(err) => {
                errors.merge(err);
                None
            }
        };
        match number.zip(account) {
            Some((number, account)) => {
                accounts.insert(number, account);
            }
            None => complete = false,
        }
    }
    complete.then_some(accounts)
}

/// The signed payload of a change request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedChangeRequestMessage {
    pub account_lock: AccountLock,
    pub payload: RequestPayload,
}

impl SignedChangeRequestMessage {
    pub fn genesis(
        account_lock: AccountLock,
        accounts: BTreeMap<AccountNumber, AlphaAccount>,
    ) -> Self {
        Self {
            account_lock,
            payload: RequestPayload::Genesis { accounts },
        }
    }

    pub fn node_declaration(account_lock: AccountLock, node: NodeDeclaration) -> Self {
        Self {
            account_lock,
            payload: RequestPayload::NodeDeclaration { node },
        }
    }

    pub fn request_type(&self) -> Type {
        self.payload.request_type()
    }

    /// Decode from a JSON value, reporting errors under `path`.
    pub fn from_value(value: &Value, path: &str) -> Result<Self, ValidationError> {
        let object = parse::object(value, path)?;
        let mut errors = ValidationError::default();

        let request_type = parse::type_tag(object, path, &mut errors);
        let account_lock = parse::field(object, path, "account_lock", &mut errors);
        let payload = request_type.and_then(|request_type| {
            let mut allowed = vec!["account_lock", "type"];
            allowed.extend_from_slice(RequestPayload::field_names(request_type));
            parse::reject_unknown(object, path, &allowed, &mut errors);
            RequestPayload::from_object(request_type, object, path, &mut errors)
        });

        errors.into_result()?;
        match (account_lock, payload) {
            (Some(account_lock), Some(payload)) => Ok(Self {
                account_lock,
                payload,
            }),
            _ => Err(ValidationError::non_field("Invalid data.")),
        }
    }
}

impl Serialize for SignedChangeRequestMessage {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(3))?;
        map.serialize_entry("account_lock", &self.account_lock)?;
        map.serialize_entry("type", &self.request_type())?;
        match &self.payload {
            RequestPayload::Genesis { accounts } => map.serialize_entry("accounts", accounts)?,
            RequestPayload::NodeDeclaration { node } => map.serialize_entry("node", node)?,
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for SignedChangeRequestMessage {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = Value::deserialize(deserializer)?;
        Self::from_value(&value, "").map_err(de::Error::custom)
    }
}

/// A change request signed by the account it changes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SignedChangeRequest {
    pub signer: AccountNumber,
    pub signature: Signature,
    pub message: SignedChangeRequestMessage,
}

impl SignedChangeRequest {
    /// Sign `message` with `signing_key`; the signer is derived from the key.
    pub fn create(
        message: SignedChangeRequestMessage,
        signing_key: &SigningKey,
    ) -> LedgerResult<Self> {
        Ok(Self {
            signer: derive_public_key(signing_key)?,
            signature: sign_value(&message, signing_key)?,
            message,
        })
    }

    pub fn request_type(&self) -> Type {
        self.message.request_type()
    }

    pub fn is_genesis(&self) -> bool {
        self.request_type() == Type::Genesis
    }

    /// Hash of the whole signed request. Becomes the signer's next lock.
    pub fn make_hash(&self) -> LedgerResult<Hash> {
        Ok(hash_value(self)?)
    }

    pub fn is_signature_valid(&self) -> bool {
        verify_value(&self.signer, &self.message, &self.signature)
    }

    /// Decode a request envelope with field-path errors.
    pub fn from_value(value: &Value) -> Result<Self, ValidationError> {
        let object = parse::object(value, "")?;
        let mut errors = ValidationError::default();

        parse::reject_unknown(object, "", &["signer", "signature", "message"], &mut errors);
        let signer = parse::field(object, "", "signer", &mut errors);
        let signature = parse::field(object, "", "signature", &mut errors);
        let message = match object.get("message") {
            Some(message) => SignedChangeRequestMessage::from_value(message, "message")
                .map_err(|err| errors.merge(err))
                .ok(),
            None => {
                errors.push(join("", "message"), parse::REQUIRED);
                None
            }
        };

        errors.into_result()?;
        match (signer, signature, message) {
            (Some(signer), Some(signature), Some(message)) => Ok(Self {
                signer,
                signature,
                message,
            }),
            _ => Err(ValidationError::non_field("Invalid data.")),
        }
    }

    /// Full validation against the ledger: structure, signature, account
    /// lock, then variant business rules.
    pub fn validate(&self, ledger: &dyn LedgerReader) -> LedgerResult<()> {
        self.validate_structure()?;

        if !self.is_signature_valid() {
            return Err(LedgerError::Signature { subject: "request" });
        }

        let expected = ledger.current_lock(&self.signer)?;
        if expected != self.message.account_lock {
            return Err(LedgerError::StaleLock {
                account: self.signer.clone(),
                expected,
                actual: self.message.account_lock.clone(),
            });
        }

        self.validate_business(ledger)
    }
}

impl<'de> Deserialize<'de> for SignedChangeRequest {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = Value::deserialize(deserializer)?;
        Self::from_value(&value).map_err(de::Error::custom)
    }
}
