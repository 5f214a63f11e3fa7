pub mod billing;
pub mod webhook;
