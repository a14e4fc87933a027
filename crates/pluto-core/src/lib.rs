pub mod config;
pub mod dispatcher;
pub mod error;
pub mod fallback;
pub mod mock_server;
pub mod mode;
pub mod preferences;
pub mod remote;
pub mod scheduler;
pub mod session;
pub mod state;
pub mod transport;

// Re-export main types for convenience
pub use config::Config;
pub use dispatcher::{DispatchResult, FallbackReason, QueryDispatcher, ReplySource};
pub use error::{ClientError, PreferenceError, ShapeError, TransportError};
pub use fallback::FallbackResponder;
pub use mode::DispatchMode;
pub use preferences::{FilePreferences, MemoryPreferences, PreferenceStore};
pub use remote::RemoteQueryClient;
pub use scheduler::{Poller, ScheduleState, SchedulerClient};
pub use session::ChatSession;
pub use state::{ChatMessage, ChatRole, ConversationLog, MessageId};
pub use transport::{HttpRequest, HttpTransport, RawResponse, ReqwestTransport};
