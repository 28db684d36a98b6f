//! Sidetrek dev server
//!
//! Pushes the dbt lineage graph to the Sidetrek UI over a WebSocket and keeps
//! it current while the user edits models.
//!
//! ## Flow
//!
//! 1. The UI opens a WebSocket; the server runs `dbt run` once for the project.
//! 2. The UI sends any message; the server starts watching the models directory.
//! 3. Every (debounced) change re-parses the project and pushes
//!    `{ "topic": "dag", "data": "<graph json>" }`.
//!
//! ## Usage
//!
//! ```bash
//! cd my-project && sidetrek-server --port 3000
//! ```

mod http;
mod session;

pub mod protocol;
pub mod watcher;

pub use http::{router, serve, AppState};
pub use protocol::{Envelope, Topic};
pub use watcher::{ChangeBatch, ModelWatcher, WatchError, WatchOptions};
