mod compiler;
mod database;
mod discovery;
mod hashing;
mod pipeline;
mod types;

pub use compiler::{ContentCompileError, ContentCompiler, ContentErrorCode, SourceLocation};
pub use database::ContentDatabase;
pub use pipeline::{compile_content_from_str, load_content_database, ContentPipelineError};
pub use types::{ContentDiscoveryError, ContentRequest};
