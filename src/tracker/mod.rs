mod client;
mod registry;
mod server;

pub use client::TrackerClient;
pub use registry::{Registry, RegistryError};
pub use server::Tracker;
