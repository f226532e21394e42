pub mod config;
pub mod error;
pub mod file;
pub mod hash;
pub mod message;
pub mod net;
pub mod peer;
pub mod record;
pub mod tracker;
