use chrono::{DateTime, Utc};

use super::{Tables, Undo, WriteTx};
use crate::world::{NodeId, PlayerId, PlayerResourceCollect};

impl Tables {
    /// Most recent audit record for (player, node) created at or after `since`.
    pub fn latest_collect_since(
        &self,
        player_id: PlayerId,
        node_id: NodeId,
        since: DateTime<Utc>,
    ) -> Option<&PlayerResourceCollect> {
        self.collects
            .iter()
            .rev()
            .filter(|record| record.player_id == player_id && record.node_id == node_id)
            .find(|record| record.created_utc >= since)
    }

    pub fn collect_records(&self) -> &[PlayerResourceCollect] {
        &self.collects
    }
}

impl WriteTx<'_> {
    pub fn append_collect(&mut self, record: PlayerResourceCollect) {
        self.tables.collects.push(record);
        self.undo.push(Undo::CollectAppended);
    }
}

#[cfg(test)]
mod tests {
    use chrono::Duration;
    use uuid::Uuid;

    use super::super::{Database, StoreError};
    use super::*;

    #[test]
    fn window_is_inclusive_and_scoped_to_the_pair() {
        let db = Database::new();
        let player = PlayerId::new();
        let node = NodeId::new();
        let other_node = NodeId::new();
        let at = Utc::now();
        db.write(|tx| {
            tx.append_collect(PlayerResourceCollect {
                id: Uuid::new_v4(),
                player_id: player,
                node_id: node,
                created_utc: at,
            });
            Ok::<_, StoreError>(())
        })
        .unwrap();

        let read = db.read().unwrap();
        assert!(read.latest_collect_since(player, node, at).is_some());
        assert!(read
            .latest_collect_since(player, node, at + Duration::milliseconds(1))
            .is_none());
        assert!(read.latest_collect_since(player, other_node, at).is_none());
        assert!(read
            .latest_collect_since(PlayerId::new(), node, at)
            .is_none());
    }
}
