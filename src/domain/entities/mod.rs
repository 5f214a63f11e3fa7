pub mod payment_event;
pub mod subscription;
pub mod transition;
pub mod user_account;
