pub mod config;
pub mod criteria;
pub mod environment;
pub mod error;
pub mod grid;
pub mod history;
pub mod mask;
pub mod models;
pub mod physics;
pub mod route;
pub mod router;
