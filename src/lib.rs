// Library root
// -----------
// A test-support client that logs in to the API as a user or agent and
// then uploads and downloads files on its behalf, so tests do not have
// to redo auth and transfer plumbing themselves.
//
// Module responsibilities:
// - `config`: who to log in as and where the API lives.
// - `error`: the single error type returned by every call.
// - `api`: `ApiBase`, the session-holding client, and the chunked
//   download iterator.
// - `user`: `UserApi`, the endpoints reachable with a user login.
// - `ui`: the interactive terminal driver used by the binary.
pub mod api;
pub mod config;
pub mod error;
pub mod ui;
pub mod user;

pub use api::{ApiBase, ByteChunks, CHUNK_SIZE};
pub use config::ClientConfig;
pub use error::ApiError;
pub use user::{RecordingQuery, UserApi};
