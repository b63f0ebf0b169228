pub mod auth;
pub mod config;
pub mod context;
pub mod db;
pub mod error;
pub mod flash;
pub mod forms;
pub mod models;
pub mod routes;
pub mod services;
pub mod state;
