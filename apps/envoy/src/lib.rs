pub mod adapters;
pub mod classifier;
pub mod config;
pub mod errors;
pub mod http_client;
pub mod messages;
pub mod models;
pub mod normalizer;
pub mod notifier;
pub mod orchestrator;
pub mod proposal;
pub mod scheduler;
pub mod server;
pub mod store;
