use chrono::{DateTime, Utc};

use super::{Tables, Undo, WriteTx};
use crate::spatial::BoundingBox;
use crate::world::{NodeId, ResourceNode};

impl Tables {
    pub fn node(&self, id: NodeId) -> Option<&ResourceNode> {
        self.nodes.get(&id)
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Nodes inside `bbox`, in id order.
    pub fn nodes_in_box(&self, bbox: BoundingBox) -> impl Iterator<Item = &ResourceNode> + '_ {
        self.nodes
            .values()
            .filter(move |node| bbox.contains(node.latitude, node.longitude))
    }
}

impl WriteTx<'_> {
    pub fn insert_node(&mut self, node: ResourceNode) {
        let id = node.id;
        match self.tables.nodes.insert(id, node) {
            Some(previous) => self.undo.push(Undo::NodeChanged(previous)),
            None => self.undo.push(Undo::NodeInserted(id)),
        }
    }

    /// Applies `change` to node `id` only when `predicate` holds right now.
    /// Returns the number of rows changed (0 or 1).
    fn update_node_if(
        &mut self,
        id: NodeId,
        predicate: impl FnOnce(&ResourceNode) -> bool,
        change: impl FnOnce(&mut ResourceNode),
    ) -> usize {
        let Some(node) = self.tables.nodes.get_mut(&id) else {
            return 0;
        };
        if !predicate(node) {
            return 0;
        }
        let previous = node.clone();
        change(node);
        self.undo.push(Undo::NodeChanged(previous));
        1
    }

    /// Takes `desired` units from the node if it still has them and is not
    /// waiting on a refill.
    pub fn decrement_if_available(&mut self, id: NodeId, desired: u32, now: DateTime<Utc>) -> usize {
        self.update_node_if(
            id,
            |node| node.amount > 0 && !node.is_respawning(now) && node.amount >= desired,
            |node| {
                node.amount -= desired;
                node.updated_utc = now;
            },
        )
    }

    /// Stamps the refill time on a node that sits at zero with no refill
    /// pending. A respawn already scheduled by someone else is left alone.
    pub fn schedule_respawn_if_depleted(
        &mut self,
        id: NodeId,
        respawn_at: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> usize {
        self.update_node_if(
            id,
            |node| node.amount == 0 && !node.is_respawning(now),
            |node| {
                node.respawn_at_utc = Some(respawn_at);
                node.updated_utc = now;
            },
        )
    }

    pub fn refill_if_due(&mut self, id: NodeId, now: DateTime<Utc>) -> usize {
        self.update_node_if(id, |node| node.is_refill_due(now), |node| refill(node, now))
    }

    pub fn refill_due_in_box(&mut self, bbox: BoundingBox, now: DateTime<Utc>) -> usize {
        let due: Vec<NodeId> = self
            .nodes_in_box(bbox)
            .filter(|node| node.is_refill_due(now))
            .map(|node| node.id)
            .collect();
        due.into_iter()
            .map(|id| self.refill_if_due(id, now))
            .sum()
    }
}

fn refill(node: &mut ResourceNode, now: DateTime<Utc>) {
    node.amount = node.max_amount;
    node.respawn_at_utc = None;
    node.updated_utc = now;
}
