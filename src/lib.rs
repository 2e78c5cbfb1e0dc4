pub mod clock;
pub mod collector;
pub mod config;
pub mod engine;
pub mod flags;
pub mod inventory;
pub mod players;
pub mod query;
pub mod respawn;
pub mod rules;
pub mod seed;
pub mod spatial;
pub mod store;
pub mod web;
pub mod world;

pub use collector::{CollectOutcome, CollectRequest, RejectReason, ResourceCollector};
pub use config::ServerConfig;
pub use engine::{Engine, EngineBuilder, EngineSettings};
