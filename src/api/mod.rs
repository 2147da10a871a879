pub mod client;
pub mod error;
mod logging;
pub mod mock_client;
pub mod protocol;
pub mod stream;

pub use client::{ApiClient, ResponsesTransport};
pub use error::{RoutingError, TransportFailure};
