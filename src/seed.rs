use std::{
    collections::BTreeMap,
    f64::consts::PI,
    fs,
    path::{Path, PathBuf},
};

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use rand::{seq::SliceRandom, Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::Deserialize;
use thiserror::Error;
use uuid::Uuid;

use crate::spatial::{valid_latitude, valid_longitude, EARTH_RADIUS_METERS};
use crate::store::{Database, InsertOutcome, StoreError, WriteTx};
use crate::world::{Player, PlayerId, ResourceNode};

#[derive(Debug, Error)]
pub enum SeedError {
    #[error("seed validation error: {0}")]
    Validation(String),
    #[error(transparent)]
    Store(#[from] StoreError),
}

fn default_scatter_seed() -> u64 {
    7
}

fn default_min_amount() -> u32 {
    5
}

fn default_max_amount() -> u32 {
    25
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct WorldSeed {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub flags: BTreeMap<String, bool>,
    #[serde(default)]
    pub players: Vec<SeedPlayer>,
    #[serde(default)]
    pub nodes: Vec<SeedNode>,
    #[serde(default)]
    pub scatter: Vec<ScatterBlock>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SeedPlayer {
    pub username: String,
    pub latitude: f64,
    pub longitude: f64,
    #[serde(default)]
    pub token: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SeedNode {
    #[serde(rename = "type")]
    pub resource_type: String,
    pub latitude: f64,
    pub longitude: f64,
    pub max_amount: u32,
    #[serde(default)]
    pub amount: Option<u32>,
}

/// Nodes placed uniformly at random inside a circle.
#[derive(Debug, Clone, Deserialize)]
pub struct ScatterBlock {
    pub center_latitude: f64,
    pub center_longitude: f64,
    pub radius_meters: f64,
    pub count: u32,
    pub types: Vec<String>,
    #[serde(default = "default_min_amount")]
    pub min_amount: u32,
    #[serde(default = "default_max_amount")]
    pub max_amount: u32,
    #[serde(default = "default_scatter_seed")]
    pub seed: u64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SeedReport {
    pub applied: bool,
    pub nodes: usize,
    pub players: usize,
    pub flags: usize,
}

pub struct SeedLoader {
    base_dir: PathBuf,
}

impl SeedLoader {
    pub fn new(base_dir: impl AsRef<Path>) -> Self {
        Self {
            base_dir: base_dir.as_ref().to_path_buf(),
        }
    }

    pub fn load(&self, file: impl AsRef<Path>) -> Result<WorldSeed> {
        let path = self.base_dir.join(file);
        let data = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read seed file {}", path.display()))?;
        let seed: WorldSeed = serde_yaml::from_str(&data)
            .with_context(|| format!("Failed to parse {}", path.display()))?;
        seed.validate()
            .with_context(|| format!("Invalid seed {}", path.display()))?;
        Ok(seed)
    }
}

impl WorldSeed {
    pub fn validate(&self) -> Result<(), SeedError> {
        for node in &self.nodes {
            if node.max_amount == 0 {
                return Err(SeedError::Validation(format!(
                    "{} node must have max_amount greater than zero",
                    node.resource_type
                )));
            }
            if node.amount.is_some_and(|amount| amount > node.max_amount) {
                return Err(SeedError::Validation(format!(
                    "{} node amount exceeds max_amount {}",
                    node.resource_type, node.max_amount
                )));
            }
            check_position(node.latitude, node.longitude)?;
        }
        for player in &self.players {
            check_position(player.latitude, player.longitude)?;
        }
        for block in &self.scatter {
            check_position(block.center_latitude, block.center_longitude)?;
            if block.types.is_empty() {
                return Err(SeedError::Validation(
                    "scatter block must list at least one type".into(),
                ));
            }
            if block.min_amount == 0 || block.min_amount > block.max_amount {
                return Err(SeedError::Validation(format!(
                    "scatter amounts must satisfy 0 < min ({}) <= max ({})",
                    block.min_amount, block.max_amount
                )));
            }
            if block.radius_meters.is_nan() || block.radius_meters < 0.0 {
                return Err(SeedError::Validation(
                    "scatter radius must be non-negative".into(),
                ));
            }
        }
        Ok(())
    }

    /// Writes the seed into an empty database in one transaction. A database
    /// that already holds nodes or players is left untouched.
    pub fn apply(&self, db: &Database, now: DateTime<Utc>) -> Result<SeedReport, SeedError> {
        self.validate()?;
        db.write(|tx| {
            if tx.node_count() > 0 || tx.player_count() > 0 {
                tracing::info!(seed = %self.name, "database already populated; skipping seed");
                return Ok(SeedReport::default());
            }
            let mut report = SeedReport {
                applied: true,
                ..SeedReport::default()
            };
            for (key, enabled) in &self.flags {
                tx.set_flag(key.trim(), *enabled);
                report.flags += 1;
            }
            for player in &self.players {
                insert_player(tx, player, now)?;
                report.players += 1;
            }
            for node in self.build_nodes(now) {
                tx.insert_node(node);
                report.nodes += 1;
            }
            tracing::info!(
                seed = %self.name,
                nodes = report.nodes,
                players = report.players,
                flags = report.flags,
                "seeded world"
            );
            Ok(report)
        })
    }

    pub fn build_nodes(&self, now: DateTime<Utc>) -> Vec<ResourceNode> {
        let mut nodes: Vec<ResourceNode> = self
            .nodes
            .iter()
            .map(|node| {
                let built = ResourceNode::new(
                    node.resource_type.trim(),
                    node.latitude,
                    node.longitude,
                    node.max_amount,
                    now,
                );
                match node.amount {
                    Some(amount) => built.with_amount(amount),
                    None => built,
                }
            })
            .collect();
        for block in &self.scatter {
            nodes.extend(block.scatter(now));
        }
        nodes
    }
}

impl ScatterBlock {
    fn scatter(&self, now: DateTime<Utc>) -> Vec<ResourceNode> {
        let mut rng = ChaCha8Rng::seed_from_u64(self.seed);
        let meters_per_degree = EARTH_RADIUS_METERS * PI / 180.0;
        let lng_scale = self.center_latitude.to_radians().cos().max(1e-6);
        (0..self.count)
            .filter_map(|_| {
                let distance = self.radius_meters * rng.gen::<f64>().sqrt();
                let bearing = rng.gen_range(0.0..(2.0 * PI));
                let lat = self.center_latitude + distance * bearing.cos() / meters_per_degree;
                let lng = self.center_longitude
                    + distance * bearing.sin() / (meters_per_degree * lng_scale);
                let kind = self.types.choose(&mut rng)?;
                let max_amount = rng.gen_range(self.min_amount..=self.max_amount);
                Some(ResourceNode::new(
                    kind.trim(),
                    lat.clamp(-90.0, 90.0),
                    lng.clamp(-180.0, 180.0),
                    max_amount,
                    now,
                ))
            })
            .collect()
    }
}

fn check_position(lat: f64, lng: f64) -> Result<(), SeedError> {
    if valid_latitude(lat) && valid_longitude(lng) {
        Ok(())
    } else {
        Err(SeedError::Validation(format!(
            "position ({lat}, {lng}) is out of range"
        )))
    }
}

fn insert_player(tx: &mut WriteTx<'_>, seed: &SeedPlayer, now: DateTime<Utc>) -> Result<(), SeedError> {
    let player = Player {
        id: PlayerId::new(),
        username: seed.username.trim().to_string(),
        latitude: seed.latitude,
        longitude: seed.longitude,
        api_token: seed
            .token
            .clone()
            .unwrap_or_else(|| Uuid::new_v4().simple().to_string()),
        created_utc: now,
    };
    match tx.insert_player(player) {
        InsertOutcome::Inserted => Ok(()),
        InsertOutcome::AlreadyExists => Err(SeedError::Validation(format!(
            "duplicate token for seeded player {}",
            seed.username
        ))),
    }
}
