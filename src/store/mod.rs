//! In-process transactional store for nodes, audit records, inventory,
//! players and feature flags.
//!
//! Readers take a [`ReadTx`]; writers take a [`WriteTx`], which holds the
//! tables exclusively and records an undo entry for every change. Dropping a
//! `WriteTx` without calling [`WriteTx::commit`] restores the tables to the
//! state they had when the transaction began.

mod collects;
mod inventory;
mod nodes;
mod players;

use std::collections::BTreeMap;
use std::fs;
use std::ops::Deref;
use std::path::Path;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::world::{NodeId, Player, PlayerId, PlayerInventory, PlayerResourceCollect, ResourceNode};

pub use inventory::InsertOutcome;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store lock was poisoned")]
    LockPoisoned,

    #[error("write conflict on {0}")]
    Conflict(String),

    #[error("snapshot I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("snapshot JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, StoreError>;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Tables {
    nodes: BTreeMap<NodeId, ResourceNode>,
    collects: Vec<PlayerResourceCollect>,
    inventory: Vec<PlayerInventory>,
    players: BTreeMap<PlayerId, Player>,
    flags: BTreeMap<String, bool>,
}

#[derive(Debug)]
enum Undo {
    NodeInserted(NodeId),
    NodeChanged(ResourceNode),
    CollectAppended,
    InventoryInserted,
    InventoryChanged(usize, PlayerInventory),
    PlayerInserted(PlayerId),
    FlagChanged(String, Option<bool>),
}

#[derive(Debug, Default)]
pub struct Database {
    tables: RwLock<Tables>,
}

impl Database {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_tables(tables: Tables) -> Self {
        Self {
            tables: RwLock::new(tables),
        }
    }

    pub fn read(&self) -> Result<ReadTx<'_>> {
        let tables = self.tables.read().map_err(|_| StoreError::LockPoisoned)?;
        Ok(ReadTx { tables })
    }

    pub fn begin(&self) -> Result<WriteTx<'_>> {
        let tables = self.tables.write().map_err(|_| StoreError::LockPoisoned)?;
        Ok(WriteTx {
            tables,
            undo: Vec::new(),
            committed: false,
        })
    }

    /// Runs `work` in a fresh transaction, committing only when it returns `Ok`.
    pub fn write<T, E>(&self, work: impl FnOnce(&mut WriteTx<'_>) -> std::result::Result<T, E>) -> std::result::Result<T, E>
    where
        E: From<StoreError>,
    {
        let mut tx = self.begin()?;
        let value = work(&mut tx)?;
        tx.commit();
        Ok(value)
    }

    pub fn snapshot(&self) -> Result<Tables> {
        Ok(self.read()?.tables.clone())
    }

    /// Writes every table to `path` as JSON, via a sibling temp file so a
    /// crash never leaves a half-written snapshot behind.
    pub fn save_json(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let tables = self.snapshot()?;
        let json = serde_json::to_vec_pretty(&tables)?;
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, json)?;
        fs::rename(&tmp, path)?;
        Ok(())
    }

    pub fn load_json(path: impl AsRef<Path>) -> Result<Self> {
        let data = fs::read(path)?;
        let tables: Tables = serde_json::from_slice(&data)?;
        Ok(Self::from_tables(tables))
    }
}

pub struct ReadTx<'a> {
    tables: RwLockReadGuard<'a, Tables>,
}

impl Deref for ReadTx<'_> {
    type Target = Tables;

    fn deref(&self) -> &Tables {
        &self.tables
    }
}

pub struct WriteTx<'a> {
    tables: RwLockWriteGuard<'a, Tables>,
    undo: Vec<Undo>,
    committed: bool,
}

impl WriteTx<'_> {
    pub fn commit(mut self) {
        self.committed = true;
        self.undo.clear();
    }

    /// Explicit rollback; equivalent to dropping the transaction.
    pub fn rollback(self) {}

    fn rollback_in_place(&mut self) {
        let tables = &mut *self.tables;
        while let Some(entry) = self.undo.pop() {
            match entry {
                Undo::NodeInserted(id) => {
                    tables.nodes.remove(&id);
                }
                Undo::NodeChanged(previous) => {
                    tables.nodes.insert(previous.id, previous);
                }
                Undo::CollectAppended => {
                    tables.collects.pop();
                }
                Undo::InventoryInserted => {
                    tables.inventory.pop();
                }
                Undo::InventoryChanged(index, previous) => {
                    if let Some(row) = tables.inventory.get_mut(index) {
                        *row = previous;
                    }
                }
                Undo::PlayerInserted(id) => {
                    tables.players.remove(&id);
                }
                Undo::FlagChanged(key, previous) => match previous {
                    Some(enabled) => {
                        tables.flags.insert(key, enabled);
                    }
                    None => {
                        tables.flags.remove(&key);
                    }
                },
            }
        }
    }
}

impl Deref for WriteTx<'_> {
    type Target = Tables;

    fn deref(&self) -> &Tables {
        &self.tables
    }
}

impl Drop for WriteTx<'_> {
    fn drop(&mut self) {
        if !self.committed && !self.undo.is_empty() {
            tracing::debug!(changes = self.undo.len(), "rolling back uncommitted transaction");
            self.rollback_in_place();
        }
    }
}
