pub mod api;
pub mod config;
pub mod controller;
pub mod error;
pub mod models;
pub mod session;
pub mod view;

pub use api::{ApiClient, HttpRequest, HttpResponse, HttpTransport};
pub use config::ClientConfig;
pub use controller::{ApiCall, AppState, Controller, Effect, Msg, Phase};
pub use error::{ApiError, ApiResult, StorageError, TransportError};
pub use models::{Credential, Session, Task, TaskId, User};
pub use session::{KeyValueStore, MemoryStore, SessionStore};
pub use view::{compute_stats, compute_visible, Filter, Stats};
