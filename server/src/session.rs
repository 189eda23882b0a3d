//! Authoritative game session for the single global room.
//!
//! The [`SessionManager`] owns the player registry and the [`Round`]. It is
//! driven from one task (see `network::Server::run`), so every handler runs
//! to completion before the next event is looked at and no locking is
//! needed. Outbound notifications are queued on the game channel and fanned
//! out by the network layer; timers are spawned tasks that report back
//! through the server channel.

use crate::game::{apply_outcome, Round};
use crate::network::{GameMessage, ServerMessage};
use crate::utils::{duration_ms, get_timestamp};
use log::{debug, error, info};
use shared::{
    inflation_size, ClientEvent, ConnectionId, GameEndedPayload, NutType, Player, PlayerMap,
    RoundConfig, ServerEvent, EVICTION_DELAY_MS, KEY_PRESS_COOLDOWN_MS, ROUND_DURATION_MS,
    TARGET_PRESSES,
};
use std::collections::HashMap;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{sleep, Duration, Instant};

/// Tunables for a game session.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionConfig {
    pub round_duration: Duration,
    /// Presses needed to burst and win early. `None` runs timer-only rounds.
    pub target_presses: Option<u32>,
    pub key_press_cooldown: Duration,
    /// Delay between `gameEnded` and inactivity eviction.
    pub eviction_delay: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            round_duration: Duration::from_millis(ROUND_DURATION_MS),
            target_presses: Some(TARGET_PRESSES),
            key_press_cooldown: Duration::from_millis(KEY_PRESS_COOLDOWN_MS),
            eviction_delay: Duration::from_millis(EVICTION_DELAY_MS),
        }
    }
}

pub struct SessionManager {
    config: SessionConfig,
    players: PlayerMap,
    /// Time of each player's most recent accepted press.
    last_accepted_press: HashMap<ConnectionId, Instant>,
    round: Round,
    /// Join counter used for default names.
    joined: u64,
    game_tx: mpsc::UnboundedSender<GameMessage>,
    server_tx: mpsc::UnboundedSender<ServerMessage>,
}

impl SessionManager {
    pub fn new(
        config: SessionConfig,
        game_tx: mpsc::UnboundedSender<GameMessage>,
        server_tx: mpsc::UnboundedSender<ServerMessage>,
    ) -> Self {
        let round = Round::new(config.round_duration, config.target_presses);
        Self {
            config,
            players: PlayerMap::new(),
            last_accepted_press: HashMap::new(),
            round,
            joined: 0,
            game_tx,
            server_tx,
        }
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn round(&self) -> &Round {
        &self.round
    }

    pub fn player(&self, client_id: ConnectionId) -> Option<&Player> {
        self.players.get(&client_id)
    }

    pub fn players(&self) -> &PlayerMap {
        &self.players
    }

    pub fn len(&self) -> usize {
        self.players.len()
    }

    pub fn is_empty(&self) -> bool {
        self.players.is_empty()
    }

    /// Routes an inbound client event to its handler.
    pub fn handle_client_event(&mut self, client_id: ConnectionId, event: ClientEvent) {
        match event {
            ClientEvent::KeyPress => {
                self.handle_key_press(client_id);
            }
            ClientEvent::UpdateName(name) => {
                self.rename(client_id, name);
            }
            ClientEvent::UpdateNutType(nut_type) => {
                self.set_nut_type(client_id, nut_type);
            }
            ClientEvent::StartGame => {
                self.start_round();
            }
        }
    }

    /// Adds a player for a fresh connection.
    ///
    /// The newcomer receives the full roster; everyone else hears about the
    /// arrival.
    pub fn register(&mut self, client_id: ConnectionId) -> Player {
        self.joined += 1;
        let player = Player::new(client_id, format!("Player {}", self.joined));
        self.players.insert(client_id, player.clone());

        info!(
            "Player {} joined as '{}' ({} in room)",
            client_id,
            player.name,
            self.players.len()
        );

        self.send_to(client_id, ServerEvent::CurrentPlayers(self.players.clone()));
        self.broadcast(ServerEvent::NewPlayer(player.clone()), Some(client_id));
        player
    }

    /// Removes a player regardless of round state.
    pub fn unregister(&mut self, client_id: ConnectionId) -> bool {
        self.last_accepted_press.remove(&client_id);
        if self.players.remove(&client_id).is_none() {
            return false;
        }

        info!(
            "Player {} left ({} in room)",
            client_id,
            self.players.len()
        );
        self.broadcast(ServerEvent::PlayerDisconnected(client_id), None);
        true
    }

    /// Overwrites a player's display name. No validation is applied.
    pub fn rename(&mut self, client_id: ConnectionId, name: String) -> bool {
        let Some(player) = self.players.get_mut(&client_id) else {
            return false;
        };

        debug!("Player {} renamed '{}' -> '{}'", client_id, player.name, name);
        player.name = name;
        let update = player.clone();
        self.broadcast(ServerEvent::UpdatePlayer(update), None);
        true
    }

    /// Lets a player pick their nut until the next round rerolls it.
    pub fn set_nut_type(&mut self, client_id: ConnectionId, nut_type: NutType) -> bool {
        let Some(player) = self.players.get_mut(&client_id) else {
            return false;
        };

        player.nut_type = nut_type;
        let update = player.clone();
        self.broadcast(ServerEvent::UpdatePlayer(update), None);
        true
    }

    /// Counts a key press if a round is running and the player is off cooldown.
    ///
    /// Returns true if the press was accepted. Reaching the target ends the
    /// round immediately with this player as the winner.
    pub fn handle_key_press(&mut self, client_id: ConnectionId) -> bool {
        if !self.round.is_active {
            return false;
        }

        let now = Instant::now();
        if let Some(last) = self.last_accepted_press.get(&client_id) {
            if now.duration_since(*last) < self.config.key_press_cooldown {
                debug!("Dropped press from {} (cooldown)", client_id);
                return false;
            }
        }

        let target = self.config.target_presses;
        let Some(player) = self.players.get_mut(&client_id) else {
            return false;
        };

        player.key_presses += 1;
        player.inflation_size = inflation_size(player.key_presses, target);
        let presses = player.key_presses;
        let update = player.clone();

        self.last_accepted_press.insert(client_id, now);
        debug!("Player {} press {}", client_id, presses);
        self.broadcast(ServerEvent::UpdatePlayer(update), None);

        if target.is_some_and(|target| presses >= target) {
            info!("Player {} reached the target with {} presses", client_id, presses);
            self.end_round(Some(client_id));
        }

        true
    }

    /// Starts a round if none is running and the room is not empty.
    pub fn start_round(&mut self) -> bool {
        if self.round.is_active || self.players.is_empty() {
            return false;
        }

        for player in self.players.values_mut() {
            player.reset_for_round();
        }

        let number = self.round.begin();
        let timeout = self.schedule_round_end(number);
        self.round.set_pending_timeout(timeout);

        let config = RoundConfig {
            round: number,
            duration_ms: duration_ms(self.round.duration),
            target_presses: self.round.target_presses,
            start_time: get_timestamp(),
        };
        info!(
            "Round {} running for {:?} with {} players (target: {:?})",
            number,
            self.round.duration,
            self.players.len(),
            config.target_presses
        );
        self.broadcast(ServerEvent::GameStarted(config), None);
        true
    }

    /// Closes the active round and announces the result.
    ///
    /// Safe to call more than once: only the first call after a round starts
    /// has any effect.
    pub fn end_round(&mut self, explicit_winner: Option<ConnectionId>) -> bool {
        if !self.round.finish() {
            return false;
        }

        let outcome = apply_outcome(
            &mut self.players,
            explicit_winner,
            self.config.target_presses,
        );
        let winner = outcome.winner.and_then(|id| self.players.get(&id)).cloned();

        match &winner {
            Some(player) => info!(
                "Round {} won after {:?} by {} ('{}') with {} presses{}",
                self.round.number,
                self.round.elapsed().unwrap_or_default(),
                player.id,
                player.name,
                player.key_presses,
                if outcome.threshold_reached { ", nut burst" } else { "" }
            ),
            None => info!("Round {} ended without a winner", self.round.number),
        }

        self.broadcast(
            ServerEvent::GameEnded(GameEndedPayload {
                winner,
                players: self.players.clone(),
                threshold_reached: outcome.threshold_reached,
            }),
            None,
        );

        if !outcome.inactive.is_empty() {
            self.schedule_eviction(self.round.number, outcome.inactive);
        }
        true
    }

    /// Handles the duration timer. Timers from earlier rounds are ignored.
    pub fn handle_round_timeout(&mut self, round: u64) -> bool {
        if !self.round.is_current(round) {
            debug!("Ignoring stale timer for round {}", round);
            return false;
        }
        self.end_round(None)
    }

    /// Removes players that sat out a round.
    ///
    /// A player is spared if they have started pressing again since the
    /// snapshot was taken. Returns the ids actually removed.
    pub fn evict_inactive(&mut self, round: u64, inactive: &[ConnectionId]) -> Vec<ConnectionId> {
        let mut evicted = Vec::new();
        for client_id in inactive {
            let Some(player) = self.players.get(client_id) else {
                continue;
            };
            if player.key_presses > 0 {
                continue;
            }

            info!(
                "Removing inactive player '{}' ({}) after round {}",
                player.name, client_id, round
            );
            self.send_to(*client_id, ServerEvent::KickedForInactivity);
            self.players.remove(client_id);
            self.last_accepted_press.remove(client_id);
            self.broadcast(ServerEvent::PlayerDisconnected(*client_id), Some(*client_id));
            evicted.push(*client_id);
        }

        if !evicted.is_empty() {
            info!("Removed {} inactive player(s)", evicted.len());
        }
        evicted
    }

    fn schedule_round_end(&self, round: u64) -> JoinHandle<()> {
        let server_tx = self.server_tx.clone();
        let duration = self.round.duration;
        tokio::spawn(async move {
            sleep(duration).await;
            if let Err(e) = server_tx.send(ServerMessage::RoundTimerElapsed { round }) {
                error!("Failed to deliver round timer: {}", e);
            }
        })
    }

    fn schedule_eviction(&self, round: u64, inactive: Vec<ConnectionId>) {
        let server_tx = self.server_tx.clone();
        let delay = self.config.eviction_delay;
        tokio::spawn(async move {
            sleep(delay).await;
            if let Err(e) = server_tx.send(ServerMessage::EvictionDue { round, inactive }) {
                error!("Failed to deliver eviction timer: {}", e);
            }
        });
    }

    fn send_to(&self, client_id: ConnectionId, event: ServerEvent) {
        if let Err(e) = self.game_tx.send(GameMessage::SendEvent { event, client_id }) {
            error!("Failed to queue event for sending: {}", e);
        }
    }

    fn broadcast(&self, event: ServerEvent, exclude: Option<ConnectionId>) {
        if let Err(e) = self
            .game_tx
            .send(GameMessage::BroadcastEvent { event, exclude })
        {
            error!("Failed to queue broadcast event: {}", e);
        }
    }
}
