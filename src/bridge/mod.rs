//! Model service bridge
//!
//! Encodes multi-modal requests, exchanges them with the inference backend
//! over raw TCP and reconciles the replies into per-input results.

pub mod context;
pub mod error;
pub mod message;
pub mod orchestrator;
pub mod response;
pub mod transport;

pub use context::{BridgeMode, ExchangeContext};
pub use error::{BridgeError, BridgeResult};
pub use message::{BinaryKind, BinaryPayload, ContentItem, Envelope, Message, RequestParams, Role};
pub use orchestrator::{Bridge, BridgeRequest, CorrelatedResult};
pub use response::{AttemptOutcome, ResponseDocument};
pub use transport::{ModelTransport, TcpTransport};
