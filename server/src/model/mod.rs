pub mod auto_reply_rule;
pub mod automation_log;
pub mod follow_up_task;
pub mod inbound_email;
pub mod user;
