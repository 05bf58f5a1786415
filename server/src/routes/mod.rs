mod app_router;

pub mod automation_log;
pub mod automation_rule;
pub mod follow_up;
pub mod inbound_email;

pub use app_router::AppRouter;
