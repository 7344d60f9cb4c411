mod message;
mod workspace;

pub use message::SnoozeMessage;
pub use workspace::WorkspaceToken;
