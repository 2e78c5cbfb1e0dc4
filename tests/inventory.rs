use std::sync::Arc;

use geoharvest::{
    clock::ManualClock,
    inventory::{InventoryAggregator, InventoryItem},
    store::Database,
    world::PlayerId,
};

fn aggregator(db: Arc<Database>) -> InventoryAggregator {
    InventoryAggregator::new(db, Arc::new(ManualClock::default()))
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_increments_sum_exactly() {
    let db = Arc::new(Database::new());
    let inventory = aggregator(db.clone());
    let player = PlayerId::new();

    let mut handles = Vec::new();
    for i in 0..64u64 {
        let inventory = inventory.clone();
        let kind = if i % 2 == 0 { "Wood" } else { "Iron" };
        handles.push(tokio::spawn(async move {
            inventory.increment(player, kind, i + 1).unwrap();
        }));
    }
    for handle in handles {
        handle.await.unwrap();
    }

    let wood: u64 = (0..64u64).filter(|i| i % 2 == 0).map(|i| i + 1).sum();
    let iron: u64 = (0..64u64).filter(|i| i % 2 == 1).map(|i| i + 1).sum();
    assert_eq!(
        inventory.aggregated(player).unwrap(),
        vec![
            InventoryItem {
                resource_type: "Iron".into(),
                amount: iron
            },
            InventoryItem {
                resource_type: "Wood".into(),
                amount: wood
            },
        ]
    );
    assert_eq!(db.read().unwrap().inventory_rows(player).count(), 2);
}

#[test]
fn totals_are_isolated_per_player() {
    let inventory = aggregator(Arc::new(Database::new()));
    let alice = PlayerId::new();
    let bob = PlayerId::new();

    inventory
        .increment_many(alice, [("Wood", 3), ("Stone", 2), ("wood", 4)])
        .unwrap();
    inventory.increment(bob, "Stone", 9).unwrap();

    let alice_items = inventory.aggregated(alice).unwrap();
    assert_eq!(alice_items.len(), 2);
    assert_eq!(alice_items[0].resource_type, "Stone");
    assert_eq!(alice_items[0].amount, 2);
    assert_eq!(alice_items[1].amount, 7);

    assert_eq!(inventory.aggregated(bob).unwrap()[0].amount, 9);
    assert!(inventory.aggregated(PlayerId::new()).unwrap().is_empty());
}
