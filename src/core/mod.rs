pub mod dispatch;
pub mod inference;
pub mod protocol;
pub mod resolver;
pub mod session;

// Re-export commonly used types for convenience
pub use dispatch::{PendingToolUse, ToolDispatcher};
pub use inference::{HANDSHAKE_TIMEOUT, InferenceStream, WsInferenceConfig, WsInferenceStream};
pub use protocol::{
    DEFAULT_SYSTEM_PROMPT, Envelope, Event, InferenceConfiguration, TOOL_RESULT_MAX_CHARS,
    TRUNCATION_MARKER, decode,
};
pub use resolver::{HttpQueryResolver, QueryResolver};
pub use session::{Session, SessionState, TOOL_DISPATCH_TIMEOUT};
