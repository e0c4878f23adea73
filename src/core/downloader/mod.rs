pub mod client;

pub use client::{DefaultTransport, RemoteBody, Transport};
