use chrono::{DateTime, Utc};

use super::{Tables, Undo, WriteTx};
use crate::world::{PlayerId, PlayerInventory};

/// Result of inserting into a table with a unique key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertOutcome {
    Inserted,
    /// A row with the same key was already present; nothing was written.
    AlreadyExists,
}

impl Tables {
    pub fn inventory_row(&self, player_id: PlayerId, resource_type: &str) -> Option<&PlayerInventory> {
        self.inventory
            .iter()
            .find(|row| row.matches(player_id, resource_type))
    }

    pub fn inventory_rows(&self, player_id: PlayerId) -> impl Iterator<Item = &PlayerInventory> + '_ {
        self.inventory
            .iter()
            .filter(move |row| row.player_id == player_id)
    }
}

impl WriteTx<'_> {
    /// Inserts `row` unless (player, resource type) is already taken.
    pub fn insert_inventory(&mut self, row: PlayerInventory) -> InsertOutcome {
        if self.inventory_row(row.player_id, &row.resource_type).is_some() {
            return InsertOutcome::AlreadyExists;
        }
        self.tables.inventory.push(row);
        self.undo.push(Undo::InventoryInserted);
        InsertOutcome::Inserted
    }

    /// Adds `delta` to the existing row. Returns 0 when there is no row.
    pub fn increment_inventory(
        &mut self,
        player_id: PlayerId,
        resource_type: &str,
        delta: u64,
        now: DateTime<Utc>,
    ) -> usize {
        let Some(index) = self
            .inventory
            .iter()
            .position(|row| row.matches(player_id, resource_type))
        else {
            return 0;
        };
        let row = &mut self.tables.inventory[index];
        let previous = row.clone();
        row.amount = row.amount.saturating_add(delta);
        row.updated_utc = now;
        self.undo.push(Undo::InventoryChanged(index, previous));
        1
    }
}
