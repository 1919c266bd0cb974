//! Client side of the hive forum: a typed API client plus the state a
//! frontend keeps around it (who is signed in, which category is selected,
//! the cached thread list, and live "time ago" labels).

pub mod api;
pub mod board;
pub mod error;
pub mod session;
pub mod time_label;

pub use api::ApiClient;
pub use board::{CategorySelection, OpenThread, ThreadBoard};
pub use error::{ClientError, ClientResult};
pub use session::{token_from_callback, Session};
pub use time_label::TimeLabel;
