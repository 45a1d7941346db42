pub mod prelude;

pub mod insulin_logs;
pub mod users;
