pub mod access;
pub mod applications;
pub mod auth;
pub mod cascade;
pub mod config;
pub mod db;
pub mod error;
pub mod models;
pub mod notifications;
pub mod routes;
pub mod schema;
pub mod state;
pub mod utils;
