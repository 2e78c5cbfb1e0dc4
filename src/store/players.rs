use super::{InsertOutcome, Tables, Undo, WriteTx};
use crate::world::{Player, PlayerId};

impl Tables {
    pub fn player(&self, id: PlayerId) -> Option<&Player> {
        self.players.get(&id)
    }

    pub fn player_by_token(&self, token: &str) -> Option<&Player> {
        self.players.values().find(|player| player.api_token == token)
    }

    /// Newest players first.
    pub fn recent_players(&self, limit: usize) -> Vec<&Player> {
        let mut players: Vec<&Player> = self.players.values().collect();
        players.sort_by(|a, b| b.created_utc.cmp(&a.created_utc));
        players.truncate(limit);
        players
    }

    pub fn player_count(&self) -> usize {
        self.players.len()
    }

    pub fn flag(&self, key: &str) -> Option<bool> {
        self.flags.get(key).copied()
    }

    /// All flags, sorted by key.
    pub fn flags(&self) -> impl Iterator<Item = (&str, bool)> + '_ {
        self.flags.iter().map(|(key, enabled)| (key.as_str(), *enabled))
    }
}

impl WriteTx<'_> {
    /// Player ids and API tokens are both unique.
    pub fn insert_player(&mut self, player: Player) -> InsertOutcome {
        if self.players.contains_key(&player.id) || self.player_by_token(&player.api_token).is_some() {
            return InsertOutcome::AlreadyExists;
        }
        let id = player.id;
        self.tables.players.insert(id, player);
        self.undo.push(Undo::PlayerInserted(id));
        InsertOutcome::Inserted
    }

    pub fn set_flag(&mut self, key: &str, enabled: bool) {
        let previous = self.tables.flags.insert(key.to_string(), enabled);
        self.undo.push(Undo::FlagChanged(key.to_string(), previous));
    }
}
