pub mod cache;
pub mod clock;
pub mod config;
pub mod duration;
pub mod ledger;
pub mod models;
pub mod providers;
pub mod publisher;
pub mod reconcile;
pub mod server;
pub mod snapshot;
