pub mod session_store;

pub use session_store::{SessionRecord, SessionStore, StoredArtifact};
