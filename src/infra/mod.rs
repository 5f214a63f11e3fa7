pub mod app;
pub mod card_client;
pub mod config;
pub mod db;
pub mod setup;
pub mod signature;
