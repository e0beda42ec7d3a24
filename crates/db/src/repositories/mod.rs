//! Repository layer.
//!
//! Each repository is a zero-sized struct providing async methods that
//! accept `&PgPool` as the first argument.

pub mod conversation_repo;
pub mod generation_repo;

pub use conversation_repo::ConversationRepo;
pub use generation_repo::GenerationRepo;
