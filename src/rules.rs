use std::collections::HashMap;

use chrono::Duration;

use crate::config::RespawnConfig;
use crate::world::type_key;

pub const DEFAULT_RESPAWN_MINUTES: u32 = 10;

/// Resource type → respawn delay. Lookups are case-insensitive and unknown
/// types fall back to the default delay.
#[derive(Debug, Clone)]
pub struct RespawnRules {
    minutes_by_type: HashMap<String, u32>,
    default_minutes: u32,
}

impl RespawnRules {
    pub fn new(default_minutes: u32) -> Self {
        Self {
            minutes_by_type: HashMap::new(),
            default_minutes,
        }
    }

    pub fn with_rule(mut self, resource_type: &str, minutes: u32) -> Self {
        self.minutes_by_type.insert(type_key(resource_type), minutes);
        self
    }

    pub fn from_config(config: &RespawnConfig) -> Self {
        config
            .minutes_by_type
            .iter()
            .fold(Self::new(config.default_minutes), |rules, (kind, minutes)| {
                rules.with_rule(kind, *minutes)
            })
    }

    pub fn respawn_minutes(&self, resource_type: &str) -> u32 {
        let key = type_key(resource_type);
        if key.is_empty() {
            return self.default_minutes;
        }
        self.minutes_by_type
            .get(&key)
            .copied()
            .unwrap_or(self.default_minutes)
    }

    pub fn respawn_delay(&self, resource_type: &str) -> Duration {
        Duration::minutes(i64::from(self.respawn_minutes(resource_type)))
    }
}

impl Default for RespawnRules {
    fn default() -> Self {
        Self::from_config(&RespawnConfig::default())
    }
}
