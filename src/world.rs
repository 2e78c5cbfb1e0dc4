use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(Uuid);

impl NodeId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for NodeId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl FromStr for NodeId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s).map(Self)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PlayerId(Uuid);

impl PlayerId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for PlayerId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for PlayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl FromStr for PlayerId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s).map(Self)
    }
}

/// Case-insensitive key for a resource type ("Iron" and "iron " are the same type).
pub fn type_key(resource_type: &str) -> String {
    resource_type.trim().to_ascii_lowercase()
}

/// A harvestable deposit anchored to a map position.
///
/// `amount` never exceeds `max_amount`; `respawn_at_utc` is only set while
/// the node sits at zero waiting for its refill.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceNode {
    pub id: NodeId,
    pub resource_type: String,
    pub latitude: f64,
    pub longitude: f64,
    pub amount: u32,
    pub max_amount: u32,
    pub respawn_at_utc: Option<DateTime<Utc>>,
    pub created_utc: DateTime<Utc>,
    pub updated_utc: DateTime<Utc>,
}

impl ResourceNode {
    pub fn new(
        resource_type: impl Into<String>,
        latitude: f64,
        longitude: f64,
        max_amount: u32,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: NodeId::new(),
            resource_type: resource_type.into(),
            latitude,
            longitude,
            amount: max_amount,
            max_amount,
            respawn_at_utc: None,
            created_utc: now,
            updated_utc: now,
        }
    }

    pub fn with_amount(mut self, amount: u32) -> Self {
        self.amount = amount.min(self.max_amount);
        self
    }

    /// True while a refill is scheduled and not yet due.
    pub fn is_respawning(&self, now: DateTime<Utc>) -> bool {
        matches!(self.respawn_at_utc, Some(at) if at > now)
    }

    pub fn is_refill_due(&self, now: DateTime<Utc>) -> bool {
        self.amount == 0 && matches!(self.respawn_at_utc, Some(at) if at <= now)
    }
}

/// One cooldown slot consumed by a player at a node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerResourceCollect {
    pub id: Uuid,
    pub player_id: PlayerId,
    pub node_id: NodeId,
    pub created_utc: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerInventory {
    pub id: Uuid,
    pub player_id: PlayerId,
    pub resource_type: String,
    pub amount: u64,
    pub updated_utc: DateTime<Utc>,
}

impl PlayerInventory {
    pub fn matches(&self, player_id: PlayerId, resource_type: &str) -> bool {
        self.player_id == player_id && type_key(&self.resource_type) == type_key(resource_type)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Player {
    pub id: PlayerId,
    pub username: String,
    pub latitude: f64,
    pub longitude: f64,
    pub api_token: String,
    pub created_utc: DateTime<Utc>,
}
