//! # Peer Sync (ln-04)
//!
//! Everything a node does over the network.
//!
//! - **Listing**: lazy, finite paginated streams of a peer's nodes and
//!   blocks. Dropping a stream stops fetching; calling again restarts.
//! - **Propagation**: requests, blocks and confirmations are sent to a node
//!   by trying its addresses in order. A node with no reachable address is a
//!   failure for that node only.
//! - **Synchronization**: blocks from `next_block_number` onwards are
//!   replayed in order and appended with full validation. The first failure
//!   ends the run; nothing after it is applied.
//!
//! ## Crate Structure (Hexagonal Architecture)
//!
//! - `domain/` - errors, outgoing messages, reports
//! - `ports/` - `NodeClient`
//! - `adapters/` - `HttpNodeClient` (reqwest) and `MockNodeClient`
//! - `service/` - `PeerSyncService`

pub mod adapters;
pub mod domain;
pub mod ports;
pub mod service;

pub use adapters::{HttpNodeClient, MockNodeClient, MockPeer, SentMessage};
pub use domain::{Outgoing, PeerSyncError, PropagationReport, SyncReport};
pub use ports::NodeClient;
pub use service::{list_blocks, list_nodes, PeerSyncService};
