//! One collect attempt: ordered gate checks followed by a single atomic
//! decrement + respawn stamp + inventory credit.
//!
//! Gate order is fixed: identity, feature flag, existence, cooldown,
//! respawn, distance, availability. The first failing gate decides the
//! reason. Passing the cooldown gate records an audit row that stays even if
//! a later gate rejects the attempt.

use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::clock::Clock;
use crate::config::{GameplayConfig, MAX_COLLECT_COOLDOWN_SECS};
use crate::flags::{FeatureFlags, RESOURCES_ENABLED};
use crate::inventory;
use crate::respawn::RespawnScanner;
use crate::rules::RespawnRules;
use crate::spatial::haversine_meters;
use crate::store::{Database, StoreError};
use crate::world::{NodeId, PlayerId, PlayerResourceCollect, ResourceNode};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CollectSettings {
    pub cooldown: Duration,
    pub max_distance_meters: f64,
}

impl Default for CollectSettings {
    fn default() -> Self {
        Self::from(&GameplayConfig::default())
    }
}

impl From<&GameplayConfig> for CollectSettings {
    fn from(config: &GameplayConfig) -> Self {
        Self {
            cooldown: Duration::seconds(
                i64::try_from(config.collect_cooldown_secs.min(MAX_COLLECT_COOLDOWN_SECS))
                    .unwrap_or_default(),
            ),
            max_distance_meters: config.max_distance_meters,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CollectRequest {
    pub player_id: PlayerId,
    pub player_latitude: f64,
    pub player_longitude: f64,
    pub amount: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RejectReason {
    Unauthorized,
    Disabled,
    NotFound,
    Cooldown,
    Respawning,
    TooFar,
    DepletedOrRace,
}

impl RejectReason {
    pub fn as_str(self) -> &'static str {
        match self {
            RejectReason::Unauthorized => "unauthorized",
            RejectReason::Disabled => "disabled",
            RejectReason::NotFound => "not_found",
            RejectReason::Cooldown => "cooldown",
            RejectReason::Respawning => "respawning",
            RejectReason::TooFar => "too_far",
            RejectReason::DepletedOrRace => "depleted_or_race",
        }
    }
}

impl fmt::Display for RejectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What a collect attempt produced. Rejections carry whatever node context
/// was known at the gate that failed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CollectOutcome {
    pub success: bool,
    pub reason: Option<RejectReason>,
    pub collected: u32,
    pub remaining: Option<u32>,
    pub respawn_at_utc: Option<DateTime<Utc>>,
    pub player_id: Option<PlayerId>,
    pub resource_type: Option<String>,
    pub node_id: NodeId,
}

impl CollectOutcome {
    fn rejected(node_id: NodeId, reason: RejectReason) -> Self {
        Self {
            success: false,
            reason: Some(reason),
            collected: 0,
            remaining: None,
            respawn_at_utc: None,
            player_id: None,
            resource_type: None,
            node_id,
        }
    }

    fn for_player(mut self, player_id: PlayerId) -> Self {
        self.player_id = Some(player_id);
        self
    }

    fn with_node(mut self, node: &ResourceNode) -> Self {
        self.remaining = Some(node.amount);
        self.respawn_at_utc = node.respawn_at_utc;
        self.resource_type = Some(node.resource_type.clone());
        self
    }

    pub fn is_rejected_with(&self, reason: RejectReason) -> bool {
        self.reason == Some(reason)
    }
}

struct Harvest {
    remaining: u32,
    respawn_at_utc: Option<DateTime<Utc>>,
}

pub struct ResourceCollector {
    db: Arc<Database>,
    flags: Arc<dyn FeatureFlags>,
    scanner: RespawnScanner,
    rules: RespawnRules,
    clock: Arc<dyn Clock>,
    settings: CollectSettings,
}

impl ResourceCollector {
    pub fn new(
        db: Arc<Database>,
        flags: Arc<dyn FeatureFlags>,
        rules: RespawnRules,
        clock: Arc<dyn Clock>,
        settings: CollectSettings,
    ) -> Self {
        Self {
            scanner: RespawnScanner::new(db.clone(), clock.clone()),
            db,
            flags,
            rules,
            clock,
            settings,
        }
    }

    /// Runs one collect attempt for the caller identified by `identity`.
    ///
    /// Designed rejections come back as `Ok` with `success == false`; only
    /// storage faults are errors.
    pub async fn collect(
        &self,
        identity: Option<PlayerId>,
        node_id: NodeId,
        request: &CollectRequest,
    ) -> Result<CollectOutcome, StoreError> {
        let player_id = match identity {
            Some(player_id) if player_id == request.player_id => player_id,
            _ => {
                tracing::warn!(%node_id, request_player = %request.player_id, "collect unauthorized: no matching player identity");
                return Ok(CollectOutcome::rejected(node_id, RejectReason::Unauthorized));
            }
        };

        if self.flags.is_enabled(RESOURCES_ENABLED).await? != Some(true) {
            tracing::warn!(%player_id, %node_id, flag = RESOURCES_ENABLED, "collect blocked: feature disabled");
            return Ok(CollectOutcome::rejected(node_id, RejectReason::Disabled).for_player(player_id));
        }

        self.scanner.refill_if_due(node_id)?;
        let now = self.clock.now();

        let node = self.db.read()?.node(node_id).cloned();
        let Some(node) = node else {
            tracing::warn!(%player_id, %node_id, "collect failed: node not found");
            return Ok(CollectOutcome::rejected(node_id, RejectReason::NotFound).for_player(player_id));
        };

        if let Some(last_hit) = self.claim_cooldown_slot(player_id, node_id, now)? {
            tracing::warn!(%player_id, %node_id, %last_hit, "collect blocked: cooldown");
            return Ok(CollectOutcome::rejected(node_id, RejectReason::Cooldown)
                .for_player(player_id)
                .with_node(&node));
        }

        if node.is_respawning(now) {
            tracing::warn!(%player_id, %node_id, respawn_at = ?node.respawn_at_utc, amount = node.amount, "collect blocked: respawning");
            return Ok(CollectOutcome::rejected(node_id, RejectReason::Respawning)
                .for_player(player_id)
                .with_node(&node));
        }

        let distance = haversine_meters(
            request.player_latitude,
            request.player_longitude,
            node.latitude,
            node.longitude,
        );
        if distance.is_nan() || distance > self.settings.max_distance_meters {
            tracing::warn!(
                %player_id,
                %node_id,
                distance_meters = distance,
                max_meters = self.settings.max_distance_meters,
                "collect blocked: too far"
            );
            return Ok(CollectOutcome::rejected(node_id, RejectReason::TooFar)
                .for_player(player_id)
                .with_node(&node));
        }

        let desired = request.amount.min(node.amount);
        if desired == 0 {
            tracing::warn!(%player_id, %node_id, node_amount = node.amount, "collect failed: depleted (pre-check)");
            return Ok(CollectOutcome::rejected(node_id, RejectReason::DepletedOrRace)
                .for_player(player_id)
                .with_node(&node));
        }

        let Some(harvest) = self.harvest(player_id, &node, desired, now)? else {
            tracing::warn!(%player_id, %node_id, requested = desired, "collect failed: conditional update matched no row");
            let mut outcome = CollectOutcome::rejected(node_id, RejectReason::DepletedOrRace).for_player(player_id);
            outcome.resource_type = Some(node.resource_type.clone());
            return Ok(outcome);
        };

        tracing::info!(
            %player_id,
            %node_id,
            collected = desired,
            remaining = harvest.remaining,
            respawn_at = ?harvest.respawn_at_utc,
            "collect succeeded"
        );
        Ok(CollectOutcome {
            success: true,
            reason: None,
            collected: desired,
            remaining: Some(harvest.remaining),
            respawn_at_utc: harvest.respawn_at_utc,
            player_id: Some(player_id),
            resource_type: Some(node.resource_type),
            node_id,
        })
    }

    /// Checks the cooldown window and, when it is clear, records the attempt
    /// in the same transaction. Returns the blocking record's timestamp when
    /// the window is still closed.
    fn claim_cooldown_slot(
        &self,
        player_id: PlayerId,
        node_id: NodeId,
        now: DateTime<Utc>,
    ) -> Result<Option<DateTime<Utc>>, StoreError> {
        let since = now - self.settings.cooldown;
        self.db.write(|tx| {
            if let Some(hit) = tx.latest_collect_since(player_id, node_id, since) {
                return Ok(Some(hit.created_utc));
            }
            tx.append_collect(PlayerResourceCollect {
                id: Uuid::new_v4(),
                player_id,
                node_id,
                created_utc: now,
            });
            Ok(None)
        })
    }

    /// Decrement, respawn stamp and inventory credit as one unit of work.
    /// `None` when the conditional decrement lost a race.
    fn harvest(
        &self,
        player_id: PlayerId,
        node: &ResourceNode,
        desired: u32,
        now: DateTime<Utc>,
    ) -> Result<Option<Harvest>, StoreError> {
        let respawn_at = now + self.rules.respawn_delay(&node.resource_type);
        self.db.write(|tx| {
            if tx.decrement_if_available(node.id, desired, now) == 0 {
                return Ok(None);
            }
            tx.schedule_respawn_if_depleted(node.id, respawn_at, now);
            inventory::credit(tx, player_id, &node.resource_type, u64::from(desired), now)?;

            let after = tx
                .node(node.id)
                .ok_or_else(|| StoreError::Conflict(format!("node {} vanished mid-collect", node.id)))?;
            Ok(Some(Harvest {
                remaining: after.amount,
                respawn_at_utc: if after.amount == 0 { after.respawn_at_utc } else { None },
            }))
        })
    }
}
