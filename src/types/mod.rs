// Public modules
pub mod connection_status;
pub mod inbound_event;
pub mod message;
pub mod model_info;
pub mod provider;
pub mod query_payload;
pub mod response_metadata;
pub mod retrieval_mode;

// Re-exports
pub use connection_status::ConnectionStatus;
pub use inbound_event::{
    CHAT_QUERY_EVENT, CHAT_RESPONSE_EVENT, CREDENTIAL_WARNING_MARKER, EventKind, Fragment,
    InboundEvent, RequestFailure, SYSTEM_MESSAGE_EVENT, Severity, SystemMessage,
};
pub use message::{Message, MessageId, MessageIdGenerator, Role};
pub use model_info::ModelInfo;
pub use provider::{KnownProvider, Provider};
pub use query_payload::{QueryPayload, RequestId};
pub use response_metadata::ResponseMetadata;
pub use retrieval_mode::RetrievalMode;
