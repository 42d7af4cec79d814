pub mod app_server;
pub mod controllers;
pub mod error;
pub mod models;

pub use app_server::AppServer;
pub use error::ApiError;
