pub mod locate;
pub mod remote;
pub mod repo;

pub use locate::{dedupe_key, Candidate, Locator, Probe, Selection};
pub use remote::{canonical_url, canonicalize_remote, detect_fork, remote_included, select_remote, SelectedRemote};
pub use repo::GitRepo;
