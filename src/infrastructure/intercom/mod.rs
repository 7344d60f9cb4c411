mod client;

pub use client::IntercomClient;
