#![deny(clippy::mod_module_files)]
//! Upload files into a GitHub repository through the contents API and keep a
//! running count of successful uploads next to them.

pub mod config;
pub mod counter;
pub mod error;
pub mod remote;
pub mod server;
pub mod writer;

pub use config::{Backend, Config};
pub use counter::{CounterState, CounterUpdater};
pub use error::{RemoteError, RemoteResult};
pub use server::{router, AppState};
pub use writer::{ContentWriter, WriteOutcome};
