pub mod credential;
pub mod database;
