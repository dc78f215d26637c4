pub mod common;
pub mod credential;
pub mod database;
pub mod error;
pub mod health;
