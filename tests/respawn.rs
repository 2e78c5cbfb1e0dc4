use std::sync::Arc;

use chrono::{Duration, TimeZone, Utc};

use geoharvest::{
    clock::{Clock, ManualClock},
    collector::{CollectRequest, RejectReason},
    engine::{EngineBuilder, EngineSettings},
    flags::RESOURCES_ENABLED,
    spatial::BoundingBox,
    store::{Database, StoreError},
    world::{PlayerId, ResourceNode},
};

fn populated(clock: &ManualClock) -> (Arc<Database>, ResourceNode, ResourceNode) {
    let now = clock.now();
    let mut due = ResourceNode::new("Stone", 10.0, 10.0, 20, now).with_amount(0);
    due.respawn_at_utc = Some(now + Duration::minutes(7));
    let mut later = ResourceNode::new("Iron", 10.001, 10.001, 15, now).with_amount(0);
    later.respawn_at_utc = Some(now + Duration::minutes(10));

    let db = Arc::new(Database::new());
    db.write(|tx| {
        tx.set_flag(RESOURCES_ENABLED, true);
        tx.insert_node(due.clone());
        tx.insert_node(later.clone());
        Ok::<_, StoreError>(())
    })
    .unwrap();
    (db, due, later)
}

fn around_nodes() -> BoundingBox {
    BoundingBox::new(9.9, 9.9, 10.1, 10.1).unwrap()
}

#[test]
fn listing_refills_only_due_nodes() {
    let clock = Arc::new(ManualClock::new(Utc.with_ymd_and_hms(2025, 3, 1, 8, 0, 0).unwrap()));
    let (db, due, later) = populated(&clock);
    let engine = EngineBuilder::new(EngineSettings::default())
        .with_database(db)
        .with_clock(clock.clone())
        .build();

    clock.advance(Duration::minutes(6));
    let before = engine.query.in_box(around_nodes()).unwrap();
    assert!(before.iter().all(|view| view.amount == 0));

    clock.advance(Duration::minutes(1));
    let (refilled, views) = engine.query.refill_and_list(around_nodes()).unwrap();
    assert_eq!(refilled, 1);
    let stone = views.iter().find(|view| view.id == due.id).unwrap();
    assert_eq!(stone.amount, 20);
    assert_eq!(stone.respawn_at_utc, None);
    let iron = views.iter().find(|view| view.id == later.id).unwrap();
    assert_eq!(iron.amount, 0);
    assert!(iron.respawn_at_utc.is_some());

    let (again, _) = engine.query.refill_and_list(around_nodes()).unwrap();
    assert_eq!(again, 0);
}

#[test]
fn nodes_outside_the_box_stay_depleted() {
    let clock = Arc::new(ManualClock::new(Utc.with_ymd_and_hms(2025, 3, 1, 8, 0, 0).unwrap()));
    let (db, due, _) = populated(&clock);
    let engine = EngineBuilder::new(EngineSettings::default())
        .with_database(db.clone())
        .with_clock(clock.clone())
        .build();

    clock.advance(Duration::hours(1));
    let elsewhere = BoundingBox::new(40.0, 40.0, 41.0, 41.0).unwrap();
    assert!(engine.query.in_box(elsewhere).unwrap().is_empty());
    assert_eq!(db.read().unwrap().node(due.id).unwrap().amount, 0);

    assert!(engine.scanner.refill_if_due(due.id).unwrap());
    assert_eq!(db.read().unwrap().node(due.id).unwrap().amount, 20);
    assert!(!engine.scanner.refill_if_due(due.id).unwrap());
}

#[tokio::test]
async fn collect_after_due_time_sees_a_full_node() {
    let clock = Arc::new(ManualClock::new(Utc.with_ymd_and_hms(2025, 3, 1, 8, 0, 0).unwrap()));
    let (db, due, _) = populated(&clock);
    let engine = EngineBuilder::new(EngineSettings::default())
        .with_database(db)
        .with_clock(clock.clone())
        .build();
    let player = PlayerId::new();
    let request = CollectRequest {
        player_id: player,
        player_latitude: due.latitude,
        player_longitude: due.longitude,
        amount: 50,
    };

    let early = engine.collector.collect(Some(player), due.id, &request).await.unwrap();
    assert!(early.is_rejected_with(RejectReason::Respawning));
    assert_eq!(early.respawn_at_utc, due.respawn_at_utc);

    clock.advance(Duration::minutes(7));
    let refilled = engine.collector.collect(Some(player), due.id, &request).await.unwrap();
    assert!(refilled.success);
    assert_eq!(refilled.collected, 20);
    assert_eq!(refilled.remaining, Some(0));
    assert_eq!(
        refilled.respawn_at_utc,
        Some(clock.now() + Duration::minutes(7))
    );
}
