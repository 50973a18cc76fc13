// Library exports for Photolog
// This allows integration tests and external code to use Photolog modules

pub mod archive;
pub mod config;
pub mod db;
pub mod error;
pub mod extractors;
pub mod posts;
pub mod routes;
pub mod session;
pub mod social;
pub mod state;
pub mod store;
