use std::sync::Arc;

use crate::clock::Clock;
use crate::spatial::BoundingBox;
use crate::store::{Database, StoreError};
use crate::world::NodeId;

/// Lazy refill of depleted nodes whose respawn time has passed. Called from
/// the read and collect paths; there is no background job.
#[derive(Clone)]
pub struct RespawnScanner {
    db: Arc<Database>,
    clock: Arc<dyn Clock>,
}

impl RespawnScanner {
    pub fn new(db: Arc<Database>, clock: Arc<dyn Clock>) -> Self {
        Self { db, clock }
    }

    /// Refills every due node inside `bbox`; returns how many were refilled.
    pub fn refill_due(&self, bbox: BoundingBox) -> Result<usize, StoreError> {
        let now = self.clock.now();
        let refilled = self.db.write(|tx| Ok::<_, StoreError>(tx.refill_due_in_box(bbox, now)))?;
        if refilled > 0 {
            tracing::info!(
                count = refilled,
                min_lat = bbox.min_lat,
                min_lng = bbox.min_lng,
                max_lat = bbox.max_lat,
                max_lng = bbox.max_lng,
                "respawned nodes in bounding box"
            );
        }
        Ok(refilled)
    }

    pub fn refill_if_due(&self, node_id: NodeId) -> Result<bool, StoreError> {
        let now = self.clock.now();
        let refilled = self.db.write(|tx| Ok::<_, StoreError>(tx.refill_if_due(node_id, now)))? > 0;
        if refilled {
            tracing::debug!(%node_id, "respawned node");
        }
        Ok(refilled)
    }
}
