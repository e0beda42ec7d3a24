//! Reverie domain core.
//!
//! Pure domain types, the content cache, collaborator traits, the ffmpeg
//! media encoder and the contemplation card renderer. Nothing here talks to the database; persistence lives in
//! `reverie-db` behind the [`store::StatusStore`] trait.

pub mod cache;
pub mod card;
pub mod error;
pub mod ffmpeg;
pub mod generation;
pub mod hashing;
pub mod providers;
pub mod store;
pub mod subprocess;
pub mod types;
