pub mod health;
pub mod root;
pub mod snoozes;
pub mod workspaces;
