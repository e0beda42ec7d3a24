//! Row structs matching database tables.

pub mod conversation;
pub mod generation;
