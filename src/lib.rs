// Public modules
pub mod assembler;
pub mod catalog;
pub mod chat;
pub mod controller;
pub mod error;
pub mod render;
pub mod request;
pub mod state;
pub mod transcript;
pub mod transport;
pub mod types;

mod observability;

// Re-exports
pub use assembler::{Assembled, AssemblerPhase, FALLBACK_ERROR_TEXT, StreamAssembler};
pub use catalog::{ModelCatalog, fetch_catalog, fetch_catalog_or_builtin};
pub use controller::{ControllerPhase, SessionController};
pub use error::{Error, Result};
pub use observability::register_biometrics;
pub use render::{NullRenderer, PlainTextRenderer, Renderer};
pub use request::build_query;
pub use state::SessionState;
pub use transcript::Transcript;
pub use transport::{
    Envelope, Handler, Link, MemoryTransport, ReconnectPolicy, Transport, WebSocketTransport,
    handler,
};
pub use types::*;
