#![forbid(unsafe_code)]

use std::sync::Arc;

use parking_lot::RwLock;
use safesound_storage::repo::{AlertRepo, UserRepo};

pub mod channels;
pub mod config;
pub mod cooldown;
pub mod ingest;
pub mod orchestrator;
pub mod recipients;
pub mod supervisor;

/// Alert store handle shared between the ingest path and the HTTP surface.
pub type SharedAlertRepo = Arc<RwLock<dyn AlertRepo + Send + Sync>>;
/// Read-mostly user snapshot shared with the resolver.
pub type SharedUserRepo = Arc<RwLock<dyn UserRepo + Send + Sync>>;
