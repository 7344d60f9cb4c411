pub mod breaker;
pub mod retry;
