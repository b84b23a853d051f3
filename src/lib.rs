// Library root
// -----------
// This crate attaches a file to the Alloy Navigator computer record that
// belongs to the local machine. The binary (`main.rs`) wires configuration,
// logging and the terminal around the pieces below.
//
// Module responsibilities:
// - `transport`, `token`, `invoker`: the token-aware HTTP call with retry.
// - `api`: the client that owns the token, plus the result envelope.
// - `search`, `resolver`: structured queries and the tiered computer lookup.
// - `attachment`: base64 upload of a local file to a record.
// - `machine`: serial number and audit id of this computer.
// - `config`, `app`, `ui`: configuration, the run itself, console output.
pub mod api;
pub mod app;
pub mod attachment;
pub mod config;
pub mod error;
pub mod invoker;
pub mod machine;
pub mod resolver;
pub mod search;
pub mod token;
pub mod transport;
pub mod ui;

#[cfg(test)]
pub(crate) mod testing;

pub use api::{ApiClient, ApiResult, ObjectId};
pub use error::ApiError;
