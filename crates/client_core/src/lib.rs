pub mod config;
pub mod controller;
pub mod error;
pub mod session;
pub mod sources;
pub mod timeline;
pub mod transport;
pub mod upload;

pub use config::{load_settings, ClientSettings};
pub use controller::{CancelledQuery, PendingQuery, QueryController, QueryOptions, QueryOutcome};
pub use error::{ConfigError, TransportError, UploadError};
pub use session::{Session, SessionEvent, FAILED_CONTENT, STOPPED_CONTENT};
pub use sources::SourceView;
pub use timeline::{Message, Timeline, WELCOME_MESSAGE};
pub use transport::{HttpBackend, QueryBackend};
pub use upload::DocumentKind;

#[cfg(test)]
#[path = "tests/test_support.rs"]
mod test_support;
