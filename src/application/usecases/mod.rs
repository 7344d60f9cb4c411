pub mod cancel_snooze;
pub mod register_workspace;
pub mod schedule_snooze;
