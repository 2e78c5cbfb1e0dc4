use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::clock::Clock;
use crate::spatial::{valid_latitude, valid_longitude};
use crate::store::{Database, InsertOutcome, StoreError};
use crate::world::{Player, PlayerId};

pub const RECENT_PLAYERS_LIMIT: usize = 50;

#[derive(Debug, Error)]
pub enum RegisterError {
    #[error("username must be between 3 and 32 characters")]
    InvalidUsername,
    #[error("latitude must be between -90 and 90, longitude between -180 and 180")]
    InvalidPosition,
    #[error("player already exists")]
    Duplicate,
    #[error(transparent)]
    Store(#[from] StoreError),
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewPlayer {
    pub username: String,
    pub latitude: f64,
    pub longitude: f64,
}

/// Public view of a player; the API token is never echoed back here.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerView {
    pub id: PlayerId,
    pub username: String,
    pub latitude: f64,
    pub longitude: f64,
    pub created_utc: chrono::DateTime<chrono::Utc>,
}

impl From<&Player> for PlayerView {
    fn from(player: &Player) -> Self {
        Self {
            id: player.id,
            username: player.username.clone(),
            latitude: player.latitude,
            longitude: player.longitude,
            created_utc: player.created_utc,
        }
    }
}

/// Registration and token → identity resolution.
#[derive(Clone)]
pub struct PlayerDirectory {
    db: Arc<Database>,
    clock: Arc<dyn Clock>,
}

impl PlayerDirectory {
    pub fn new(db: Arc<Database>, clock: Arc<dyn Clock>) -> Self {
        Self { db, clock }
    }

    /// Creates a player with a fresh id and API token.
    pub fn register(&self, new_player: NewPlayer) -> Result<Player, RegisterError> {
        self.register_with_token(new_player, Uuid::new_v4().simple().to_string())
    }

    pub fn register_with_token(
        &self,
        new_player: NewPlayer,
        api_token: String,
    ) -> Result<Player, RegisterError> {
        let username = new_player.username.trim().to_string();
        if !(3..=32).contains(&username.chars().count()) {
            return Err(RegisterError::InvalidUsername);
        }
        if !valid_latitude(new_player.latitude) || !valid_longitude(new_player.longitude) {
            return Err(RegisterError::InvalidPosition);
        }
        let player = Player {
            id: PlayerId::new(),
            username,
            latitude: new_player.latitude,
            longitude: new_player.longitude,
            api_token,
            created_utc: self.clock.now(),
        };
        self.db.write(|tx| match tx.insert_player(player.clone()) {
            InsertOutcome::Inserted => Ok(()),
            InsertOutcome::AlreadyExists => Err(RegisterError::Duplicate),
        })?;
        tracing::info!(player_id = %player.id, username = %player.username, "registered player");
        Ok(player)
    }

    /// Identity for a request carrying `token`; `None` when absent or unknown.
    pub fn resolve_token(&self, token: Option<&str>) -> Result<Option<PlayerId>, StoreError> {
        let Some(token) = token.map(str::trim).filter(|token| !token.is_empty()) else {
            return Ok(None);
        };
        Ok(self.db.read()?.player_by_token(token).map(|player| player.id))
    }

    pub fn get(&self, id: PlayerId) -> Result<Option<PlayerView>, StoreError> {
        Ok(self.db.read()?.player(id).map(PlayerView::from))
    }

    pub fn recent(&self) -> Result<Vec<PlayerView>, StoreError> {
        Ok(self
            .db
            .read()?
            .recent_players(RECENT_PLAYERS_LIMIT)
            .into_iter()
            .map(PlayerView::from)
            .collect())
    }
}
