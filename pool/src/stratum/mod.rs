pub mod codec;
pub mod connection;
pub mod error;
pub mod protocol;
pub mod registry;
pub mod server;

// Re-exports
pub use connection::{Connection, ConnectionState, Graffiti, Subscription, GRAFFITI_SIZE};
pub use error::{GraffitiError, StratumError, StratumResult};
pub use protocol::{ClientMessage, Method, Randomness, ServerMessage, StratumMessage};
pub use server::StratumServer;
