pub mod client;
mod server;

pub use server::{parse_inbound, MessageHandler, MessageServer};
