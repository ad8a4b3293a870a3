mod encoding;
mod file;
mod github;
mod memory;
mod traits;

pub use encoding::{decode_content, encode_content};
pub use file::{CommitRequest, CommitResult, RemoteFile, RevisionMarker};
pub use github::{GithubClient, DEFAULT_API_URL};
pub use memory::MemoryRepository;
pub use traits::RepositoryClient;
