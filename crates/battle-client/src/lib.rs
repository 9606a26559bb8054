pub mod completion;
pub mod config;
pub mod dispatcher;
pub mod error;
pub mod matchmaking;
pub mod net;
pub mod persist;
pub mod profile;
pub mod reconciler;
pub mod session;
pub mod store;

pub use error::ClientError;
pub use net::connection::{Connection, ConnectionConfig, ConnectionEvent, ConnectionStatus};
pub use session::{MatchSession, SessionEvent};
pub use store::MatchStore;
