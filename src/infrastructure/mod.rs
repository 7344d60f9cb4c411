pub mod crypto;
pub mod intercom;
pub mod repositories;
pub mod resilience;
pub mod scheduler;
