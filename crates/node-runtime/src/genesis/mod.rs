//! # Genesis Module
//!
//! Chain initialization from an alpha account root file.
//!
//! ## Initialization Sequence
//!
//! 1. Refuse to run over an existing chain unless forced
//! 2. Read the account root file from a path or URL
//! 3. Add the optional extra account
//! 4. Build the genesis request signed by this node, with this node as the
//!    primary validator
//! 5. Under the block lock: clear the old chain if forced, append block 0

pub mod builder;

pub use builder::{
    add_extra_account, build_genesis_request, create_genesis, read_source, AccountRootFile,
    GenesisError, GenesisOptions, DEFAULT_EXTRA_ACCOUNT_BALANCE,
};
