//! Compiled JSON-Schema subset for kind-payload checks.

pub mod cache;
pub mod validator;

pub use cache::SchemaCache;
pub use validator::CompiledSchema;
