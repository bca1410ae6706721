pub mod config;
pub mod consumer;
pub mod error;
pub mod transport;

pub use config::HostConfig;
pub use consumer::{ConsumerHandle, ConsumerState, ControlMsg, ProjectionReader, StreamConsumer};
pub use error::HostError;
pub use transport::{ChannelTransport, LineTransport, Transport, TransportError};
