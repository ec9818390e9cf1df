//! Bridge to the site-analysis worker subprocess.

pub mod client;
pub mod transport;
pub mod types;

pub use client::{BridgeError, StdioConnector, WorkerBridge, WorkerConnector};
pub use transport::{StdioTransport, TransportError, WorkerTransport};
