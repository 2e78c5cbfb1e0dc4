use std::sync::Arc;

use chrono::Duration;
use reqwest::{Client, Response};
use serde_json::{json, Value};
use tokio::net::TcpListener;
use tokio::sync::oneshot;

use geoharvest::{
    clock::{Clock, ManualClock},
    engine::{EngineBuilder, EngineSettings},
    flags::RESOURCES_ENABLED,
    store::{Database, StoreError},
    web::{self, AppState, PLAYER_TOKEN_HEADER},
    world::{NodeId, ResourceNode},
};

const NEARBY: &str = "/api/resources?minLat=51.0&minLng=6.0&maxLat=52.0&maxLng=7.0";

struct TestServer {
    base: String,
    client: Client,
    db: Arc<Database>,
    clock: Arc<ManualClock>,
    state: AppState,
    node: NodeId,
    _shutdown: oneshot::Sender<()>,
}

impl TestServer {
    async fn start(enabled: bool) -> Self {
        let clock = Arc::new(ManualClock::default());
        let db = Arc::new(Database::new());
        let node = ResourceNode::new("Iron", 51.514, 6.329, 15, clock.now());
        let node_id = node.id;
        db.write(|tx| {
            tx.set_flag(RESOURCES_ENABLED, enabled);
            tx.insert_node(node);
            Ok::<_, StoreError>(())
        })
        .unwrap();

        let engine = EngineBuilder::new(EngineSettings::default())
            .with_database(db.clone())
            .with_clock(clock.clone())
            .build();
        let state = AppState::new(engine, 50);

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let (tx, rx) = oneshot::channel::<()>();
        tokio::spawn(web::serve(listener, state.clone(), async move {
            let _ = rx.await;
        }));

        Self {
            base: format!("http://{addr}"),
            client: Client::new(),
            db,
            clock,
            state,
            node: node_id,
            _shutdown: tx,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base)
    }

    async fn get(&self, path: &str) -> Response {
        self.client.get(self.url(path)).send().await.unwrap()
    }

    async fn collect(&self, node: &str, token: Option<&str>, body: Value) -> Response {
        let mut request = self
            .client
            .post(self.url(&format!("/api/resources/{node}/collect")))
            .json(&body);
        if let Some(token) = token {
            request = request.header(PLAYER_TOKEN_HEADER, token);
        }
        request.send().await.unwrap()
    }

    async fn register(&self, username: &str) -> (String, String) {
        let response = self
            .client
            .post(self.url("/api/players"))
            .json(&json!({ "username": username, "latitude": 51.514, "longitude": 6.329 }))
            .send()
            .await
            .unwrap();
        assert_eq!(response.status().as_u16(), 201);
        let player: Value = response.json().await.unwrap();
        (
            player["id"].as_str().unwrap().to_string(),
            player["apiToken"].as_str().unwrap().to_string(),
        )
    }
}

fn collect_body(player_id: &str, latitude: f64, amount: u32) -> Value {
    json!({
        "playerId": player_id,
        "playerLatitude": latitude,
        "playerLongitude": 6.329,
        "amount": amount,
    })
}

#[tokio::test]
async fn health_and_version_respond() {
    let server = TestServer::start(true).await;
    let health = server.get("/healthz").await;
    assert_eq!(health.status().as_u16(), 200);
    assert_eq!(health.text().await.unwrap(), "ok");

    let version = server.get("/version").await;
    assert_eq!(version.status().as_u16(), 200);
    let info: Value = version.json().await.unwrap();
    assert_eq!(info["name"], "geoharvest");
}

#[tokio::test]
async fn resource_listing_honours_flag_and_box() {
    let server = TestServer::start(false).await;
    assert_eq!(server.get(NEARBY).await.status().as_u16(), 404);

    server
        .db
        .write(|tx| {
            tx.set_flag(RESOURCES_ENABLED, true);
            Ok::<_, StoreError>(())
        })
        .unwrap();
    let listing = server.get(NEARBY).await;
    assert_eq!(listing.status().as_u16(), 200);
    let nodes: Value = listing.json().await.unwrap();
    assert_eq!(nodes.as_array().unwrap().len(), 1);
    assert_eq!(nodes[0]["type"], "Iron");
    assert_eq!(nodes[0]["amount"], 15);
    assert_eq!(nodes[0]["maxAmount"], 15);

    let inverted = "/api/resources?minLat=52.0&minLng=6.0&maxLat=51.0&maxLng=7.0";
    assert_eq!(server.get(inverted).await.status().as_u16(), 400);
}

#[tokio::test]
async fn collect_statuses_follow_outcomes() {
    let server = TestServer::start(true).await;
    let (player_id, token) = server.register("harvester").await;
    let node = server.node.to_string();

    let anonymous = server
        .collect(&node, None, collect_body(&player_id, 51.514, 5))
        .await;
    assert_eq!(anonymous.status().as_u16(), 401);

    let empty_request = server
        .collect(&node, Some(&token), collect_body(&player_id, 51.514, 0))
        .await;
    assert_eq!(empty_request.status().as_u16(), 400);

    let collected = server
        .collect(&node, Some(&token), collect_body(&player_id, 51.514, 5))
        .await;
    assert_eq!(collected.status().as_u16(), 200);
    let outcome: Value = collected.json().await.unwrap();
    assert_eq!(outcome["success"], true);
    assert_eq!(outcome["collected"], 5);
    assert_eq!(outcome["remaining"], 10);

    let repeat = server
        .collect(&node, Some(&token), collect_body(&player_id, 51.514, 5))
        .await;
    assert_eq!(repeat.status().as_u16(), 429);
    let outcome: Value = repeat.json().await.unwrap();
    assert_eq!(outcome["reason"], "cooldown");

    let missing = server
        .collect(&NodeId::new().to_string(), Some(&token), collect_body(&player_id, 51.514, 5))
        .await;
    assert_eq!(missing.status().as_u16(), 404);

    let malformed = server
        .collect("not-a-node", Some(&token), collect_body(&player_id, 51.514, 5))
        .await;
    assert_eq!(malformed.status().as_u16(), 404);

    let inventory = server
        .get(&format!("/api/players/{player_id}/inventory"))
        .await;
    assert_eq!(inventory.status().as_u16(), 200);
    let items: Value = inventory.json().await.unwrap();
    assert_eq!(items, json!([{ "resourceType": "Iron", "amount": 5 }]));
}

#[tokio::test]
async fn distant_player_gets_bad_request() {
    let server = TestServer::start(true).await;
    let (player_id, token) = server.register("wanderer").await;
    let response = server
        .collect(&server.node.to_string(), Some(&token), collect_body(&player_id, 51.6, 5))
        .await;
    assert_eq!(response.status().as_u16(), 400);
    let outcome: Value = response.json().await.unwrap();
    assert_eq!(outcome["reason"], "too_far");
}

#[tokio::test]
async fn players_and_flags_are_exposed() {
    let server = TestServer::start(true).await;
    let (player_id, _) = server.register("mapper").await;

    let short_name = server
        .client
        .post(server.url("/api/players"))
        .json(&json!({ "username": "x", "latitude": 0.0, "longitude": 0.0 }))
        .send()
        .await
        .unwrap();
    assert_eq!(short_name.status().as_u16(), 400);

    let listing = server.get("/api/players").await;
    assert_eq!(listing.status().as_u16(), 200);
    let players: Value = listing.json().await.unwrap();
    assert_eq!(players[0]["id"], player_id.as_str());
    assert!(players[0].get("apiToken").is_none());

    let player = server.get(&format!("/api/players/{player_id}")).await;
    assert_eq!(player.status().as_u16(), 200);

    let flag = server.get("/api/featureflags/resources_enabled").await;
    assert_eq!(flag.status().as_u16(), 200);
    let flag: Value = flag.json().await.unwrap();
    assert_eq!(flag["enabled"], true);

    let unknown = server.get("/api/featureflags/unknown_flag").await;
    assert_eq!(unknown.status().as_u16(), 404);
}

#[tokio::test]
async fn event_stream_reports_collects_and_respawns() {
    let server = TestServer::start(true).await;
    let mut events = server.state.subscribe();
    let mut stream = server.get("/api/events").await;
    assert_eq!(stream.status().as_u16(), 200);
    let content_type = stream.headers()["content-type"].to_str().unwrap().to_string();
    assert!(content_type.starts_with("text/event-stream"), "{content_type}");

    let (player_id, token) = server.register("streamer").await;
    let drained = server
        .collect(&server.node.to_string(), Some(&token), collect_body(&player_id, 51.514, 50))
        .await;
    assert_eq!(drained.status().as_u16(), 200);

    server.clock.advance(Duration::minutes(10));
    let listing: Value = server.get(NEARBY).await.json().await.unwrap();
    assert_eq!(listing[0]["amount"], 15);

    let collect: Value = serde_json::from_str(&events.recv().await.unwrap()).unwrap();
    assert_eq!(collect["kind"], "collect");
    assert_eq!(collect["outcome"]["collected"], 15);
    assert_eq!(collect["outcome"]["remaining"], 0);
    let respawn: Value = serde_json::from_str(&events.recv().await.unwrap()).unwrap();
    assert_eq!(respawn, json!({ "kind": "respawn", "count": 1 }));

    let mut seen = String::new();
    while !seen.contains(r#""kind":"respawn""#) {
        let chunk = stream.chunk().await.unwrap().expect("event stream closed early");
        seen.push_str(&String::from_utf8_lossy(&chunk));
    }
    assert!(seen.contains(r#""kind":"collect""#), "{seen}");
}
