use log::debug;
use shared::{ConnectionId, GameEndedPayload, Player, PlayerMap, RoundConfig, ServerEvent};

/// Local mirror of the room, rebuilt from server events.
#[derive(Debug, Clone, Default)]
pub struct ClientGameState {
    pub players: PlayerMap,
    /// Learned from the first `updatePlayer` that renames a player to our
    /// chosen name. Players already known under that name are skipped, but two
    /// clients renaming to the same name at once can still be confused.
    pub self_id: Option<ConnectionId>,
    pub round: Option<RoundConfig>,
    pub round_active: bool,
    pub last_result: Option<GameEndedPayload>,
    pub kicked: bool,
}

impl ClientGameState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn me(&self) -> Option<&Player> {
        self.self_id.and_then(|id| self.players.get(&id))
    }

    /// True if the last finished round was won by this client.
    pub fn won_last_round(&self) -> bool {
        match (&self.last_result, self.self_id) {
            (Some(result), Some(id)) => result.winner.as_ref().is_some_and(|w| w.id == id),
            _ => false,
        }
    }

    pub fn apply_server_event(&mut self, event: &ServerEvent, own_name: &str) {
        match event {
            ServerEvent::CurrentPlayers(players) => {
                self.players = players.clone();
            }
            ServerEvent::NewPlayer(player) => {
                self.players.insert(player.id, player.clone());
            }
            ServerEvent::UpdatePlayer(player) => {
                let renamed_to_us = player.name == own_name
                    && self
                        .players
                        .get(&player.id)
                        .map_or(true, |known| known.name != own_name);
                if self.self_id.is_none() && renamed_to_us {
                    debug!("Identified self as {}", player.id);
                    self.self_id = Some(player.id);
                }
                self.players.insert(player.id, player.clone());
            }
            ServerEvent::PlayerDisconnected(id) => {
                self.players.remove(id);
            }
            ServerEvent::GameStarted(config) => {
                for player in self.players.values_mut() {
                    player.reset_for_round();
                }
                self.round = Some(config.clone());
                self.round_active = true;
            }
            ServerEvent::GameEnded(result) => {
                self.players = result.players.clone();
                self.round_active = false;
                self.last_result = Some(result.clone());
            }
            ServerEvent::KickedForInactivity => {
                self.kicked = true;
                self.round_active = false;
            }
        }
    }
}
