pub mod crypto;
pub mod gateway;
