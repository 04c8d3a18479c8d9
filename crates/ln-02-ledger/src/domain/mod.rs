//! Domain layer: variants, construction, validation.

pub mod block;
pub mod error;
pub(crate) mod parse;
pub mod request;
pub mod validation;

pub use block::{compute_genesis_update, compute_update, Block, BlockMessage, BlockMessageUpdate};
pub use error::{LedgerError, LedgerResult, SequenceError};
pub use request::{AlphaAccount, RequestPayload, SignedChangeRequest, SignedChangeRequestMessage};
pub use validation::Validatable;
