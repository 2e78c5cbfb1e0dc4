use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::respawn::RespawnScanner;
use crate::spatial::BoundingBox;
use crate::store::{Database, StoreError};
use crate::world::{NodeId, ResourceNode};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceView {
    pub id: NodeId,
    #[serde(rename = "type")]
    pub resource_type: String,
    pub latitude: f64,
    pub longitude: f64,
    pub amount: u32,
    pub max_amount: u32,
    pub respawn_at_utc: Option<DateTime<Utc>>,
}

impl From<&ResourceNode> for ResourceView {
    fn from(node: &ResourceNode) -> Self {
        Self {
            id: node.id,
            resource_type: node.resource_type.clone(),
            latitude: node.latitude,
            longitude: node.longitude,
            amount: node.amount,
            max_amount: node.max_amount,
            respawn_at_utc: node.respawn_at_utc,
        }
    }
}

/// Read side of the node table: lists nodes in a box after refilling the
/// ones whose respawn time has passed.
#[derive(Clone)]
pub struct ResourceQuery {
    db: Arc<Database>,
    scanner: RespawnScanner,
}

impl ResourceQuery {
    pub fn new(db: Arc<Database>, scanner: RespawnScanner) -> Self {
        Self { db, scanner }
    }

    pub fn in_box(&self, bbox: BoundingBox) -> Result<Vec<ResourceView>, StoreError> {
        self.refill_and_list(bbox).map(|(_, views)| views)
    }

    /// Like [`ResourceQuery::in_box`], also reporting how many nodes were refilled.
    pub fn refill_and_list(
        &self,
        bbox: BoundingBox,
    ) -> Result<(usize, Vec<ResourceView>), StoreError> {
        let refilled = self.scanner.refill_due(bbox)?;
        let read = self.db.read()?;
        let views = read.nodes_in_box(bbox).map(ResourceView::from).collect();
        Ok((refilled, views))
    }
}

#[cfg(test)]
mod tests {
    use chrono::Duration;

    use super::*;
    use crate::clock::{Clock, ManualClock};

    #[test]
    fn listing_refills_due_nodes_first() {
        let clock = Arc::new(ManualClock::default());
        let db = Arc::new(Database::new());
        let now = clock.now();
        let mut due = ResourceNode::new("Stone", 5.0, 5.0, 12, now).with_amount(0);
        due.respawn_at_utc = Some(now - Duration::seconds(1));
        let outside = ResourceNode::new("Stone", 50.0, 50.0, 12, now);
        db.write(|tx| {
            tx.insert_node(due);
            tx.insert_node(outside);
            Ok::<_, StoreError>(())
        })
        .unwrap();

        let query = ResourceQuery::new(db.clone(), RespawnScanner::new(db, clock));
        let bbox = BoundingBox::new(0.0, 0.0, 10.0, 10.0).unwrap();
        let views = query.in_box(bbox).unwrap();
        assert_eq!(views.len(), 1);
        assert_eq!(views[0].amount, 12);
        assert_eq!(views[0].respawn_at_utc, None);
    }
}
