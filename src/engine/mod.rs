use std::sync::Arc;

use crate::{
    clock::{Clock, SystemClock},
    collector::{CollectSettings, ResourceCollector},
    config::ServerConfig,
    flags::{FeatureFlags, StoreFeatureFlags},
    inventory::InventoryAggregator,
    players::PlayerDirectory,
    query::ResourceQuery,
    respawn::RespawnScanner,
    rules::RespawnRules,
    store::Database,
};

pub struct EngineSettings {
    pub collect: CollectSettings,
    pub rules: RespawnRules,
}

impl EngineSettings {
    pub fn from_config(config: &ServerConfig) -> Self {
        Self {
            collect: CollectSettings::from(&config.gameplay),
            rules: RespawnRules::from_config(&config.respawn),
        }
    }
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self::from_config(&ServerConfig::default())
    }
}

/// Wires the services around one shared [`Database`]. Flags default to the
/// database's flag table and the clock to wall time.
pub struct EngineBuilder {
    settings: EngineSettings,
    db: Arc<Database>,
    flags: Option<Arc<dyn FeatureFlags>>,
    clock: Arc<dyn Clock>,
}

impl EngineBuilder {
    pub fn new(settings: EngineSettings) -> Self {
        Self {
            settings,
            db: Arc::new(Database::new()),
            flags: None,
            clock: Arc::new(SystemClock),
        }
    }

    pub fn with_database(mut self, db: Arc<Database>) -> Self {
        self.db = db;
        self
    }

    pub fn with_flags(mut self, flags: Arc<dyn FeatureFlags>) -> Self {
        self.flags = Some(flags);
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn build(self) -> Engine {
        let db = self.db;
        let clock = self.clock;
        let flags: Arc<dyn FeatureFlags> = match self.flags {
            Some(flags) => flags,
            None => Arc::new(StoreFeatureFlags::new(db.clone())),
        };
        let scanner = RespawnScanner::new(db.clone(), clock.clone());
        Engine {
            collector: Arc::new(ResourceCollector::new(
                db.clone(),
                flags.clone(),
                self.settings.rules,
                clock.clone(),
                self.settings.collect,
            )),
            inventory: InventoryAggregator::new(db.clone(), clock.clone()),
            query: ResourceQuery::new(db.clone(), scanner.clone()),
            players: PlayerDirectory::new(db.clone(), clock.clone()),
            scanner,
            flags,
            clock,
            db,
        }
    }
}

/// Every service the HTTP layer and the tests talk to.
#[derive(Clone)]
pub struct Engine {
    pub collector: Arc<ResourceCollector>,
    pub inventory: InventoryAggregator,
    pub query: ResourceQuery,
    pub scanner: RespawnScanner,
    pub players: PlayerDirectory,
    pub flags: Arc<dyn FeatureFlags>,
    pub clock: Arc<dyn Clock>,
    pub db: Arc<Database>,
}
