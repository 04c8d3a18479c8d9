//! Node client adapters.

pub mod http;
pub mod mock;

pub use http::HttpNodeClient;
pub use mock::{MockNodeClient, MockPeer, SentMessage};
