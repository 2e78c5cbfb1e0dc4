//! Per-player, per-resource-type running totals.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::clock::Clock;
use crate::store::{Database, InsertOutcome, StoreError, WriteTx};
use crate::world::{type_key, PlayerId, PlayerInventory};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InventoryItem {
    pub resource_type: String,
    pub amount: u64,
}

#[derive(Clone)]
pub struct InventoryAggregator {
    db: Arc<Database>,
    clock: Arc<dyn Clock>,
}

impl InventoryAggregator {
    pub fn new(db: Arc<Database>, clock: Arc<dyn Clock>) -> Self {
        Self { db, clock }
    }

    /// Adds `delta` to the player's total for `resource_type` in its own
    /// transaction.
    pub fn increment(&self, player_id: PlayerId, resource_type: &str, delta: u64) -> Result<(), StoreError> {
        let now = self.clock.now();
        self.db
            .write(|tx| credit(tx, player_id, resource_type, delta, now))
    }

    pub fn increment_many<'a>(
        &self,
        player_id: PlayerId,
        items: impl IntoIterator<Item = (&'a str, u64)>,
    ) -> Result<(), StoreError> {
        for (resource_type, delta) in items {
            self.increment(player_id, resource_type, delta)?;
        }
        Ok(())
    }

    /// Totals per resource type, sorted by type. Rows that differ only in
    /// the case of their type are summed together.
    pub fn aggregated(&self, player_id: PlayerId) -> Result<Vec<InventoryItem>, StoreError> {
        let read = self.db.read()?;
        let mut grouped: BTreeMap<String, InventoryItem> = BTreeMap::new();
        for row in read.inventory_rows(player_id) {
            grouped
                .entry(type_key(&row.resource_type))
                .and_modify(|item| item.amount = item.amount.saturating_add(row.amount))
                .or_insert_with(|| InventoryItem {
                    resource_type: row.resource_type.trim().to_string(),
                    amount: row.amount,
                });
        }
        Ok(grouped.into_values().collect())
    }
}

/// Credits `delta` inside an open transaction: try to insert a fresh row, and
/// when the (player, type) key is already taken re-apply the delta as an
/// increment of the existing row.
pub fn credit(
    tx: &mut WriteTx<'_>,
    player_id: PlayerId,
    resource_type: &str,
    delta: u64,
    now: DateTime<Utc>,
) -> Result<(), StoreError> {
    let row = PlayerInventory {
        id: Uuid::new_v4(),
        player_id,
        resource_type: resource_type.trim().to_string(),
        amount: delta,
        updated_utc: now,
    };
    match tx.insert_inventory(row) {
        InsertOutcome::Inserted => Ok(()),
        InsertOutcome::AlreadyExists => match tx.increment_inventory(player_id, resource_type, delta, now) {
            1 => Ok(()),
            _ => Err(conflict(player_id, resource_type)),
        },
    }
}

fn conflict(player_id: PlayerId, resource_type: &str) -> StoreError {
    StoreError::Conflict(format!("inventory row ({player_id}, {resource_type})"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;

    fn aggregator() -> InventoryAggregator {
        InventoryAggregator::new(Arc::new(Database::new()), Arc::new(ManualClock::default()))
    }

    #[test]
    fn first_increment_creates_row() {
        let inventory = aggregator();
        let player = PlayerId::new();
        inventory.increment(player, "Wood", 4).unwrap();
        assert_eq!(
            inventory.aggregated(player).unwrap(),
            vec![InventoryItem {
                resource_type: "Wood".into(),
                amount: 4
            }]
        );
    }

    #[test]
    fn totals_are_sorted_and_case_folded() {
        let inventory = aggregator();
        let player = PlayerId::new();
        inventory
            .increment_many(player, [("Wood", 2), ("iron", 1), ("WOOD", 3), ("Iron", 5)])
            .unwrap();
        let items = inventory.aggregated(player).unwrap();
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].amount, 6);
        assert_eq!(items[0].resource_type, "iron");
        assert_eq!(items[1].amount, 5);
    }

    #[test]
    fn other_players_are_untouched() {
        let inventory = aggregator();
        let player = PlayerId::new();
        inventory.increment(player, "Stone", 9).unwrap();
        assert!(inventory.aggregated(PlayerId::new()).unwrap().is_empty());
    }

    #[test]
    fn taken_key_falls_back_to_increment() {
        let db = Database::new();
        let player = PlayerId::new();
        let now = Utc::now();
        db.write(|tx| {
            credit(tx, player, "Iron", 4, now)?;
            credit(tx, player, " iron ", 6, now)
        })
        .unwrap();

        let read = db.read().unwrap();
        let rows: Vec<_> = read.inventory_rows(player).collect();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].resource_type, "Iron");
        assert_eq!(rows[0].amount, 10);
    }
}
