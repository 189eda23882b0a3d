use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

pub const KEY_PRESS_COOLDOWN_MS: u64 = 200;
pub const ROUND_DURATION_MS: u64 = 30_000;
pub const TARGET_PRESSES: u32 = 100;
/// Client-side celebration length after `gameEnded`.
pub const END_ANIMATION_MS: u64 = 5_000;
/// Eviction runs once the end animation has finished on every client.
pub const EVICTION_DELAY_MS: u64 = END_ANIMATION_MS + 500;
pub const MAX_FINAL_HEIGHT: f32 = 20.0;
/// Share of the target used as the minimum reference when scaling final heights.
pub const REFERENCE_TARGET_RATIO: f32 = 0.7;

/// Transport-assigned connection identifier. Never reused within a server run.
pub type ConnectionId = u64;

/// Full registry snapshot, ordered by connection id (and therefore by join order).
pub type PlayerMap = BTreeMap<ConnectionId, Player>;

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum NutType {
    Almond,
    Peanut,
    Walnut,
    Pistachio,
    Cashew,
    Hazelnut,
}

impl NutType {
    pub const ALL: [NutType; 6] = [
        NutType::Almond,
        NutType::Peanut,
        NutType::Walnut,
        NutType::Pistachio,
        NutType::Cashew,
        NutType::Hazelnut,
    ];

    /// Deterministic variant for a connection. Clients compute the same value.
    pub fn for_connection(id: ConnectionId) -> Self {
        let index = hash_code(&id.to_string()).unsigned_abs() as usize % Self::ALL.len();
        Self::ALL[index]
    }
}

/// 32-bit string hash (`h = h * 31 + c`, wrapping).
pub fn hash_code(input: &str) -> i32 {
    input.encode_utf16().fold(0i32, |hash, unit| {
        hash.wrapping_shl(5)
            .wrapping_sub(hash)
            .wrapping_add(unit as i32)
    })
}

/// Size of a player's nut for a given press count. Reaches 3x at the target.
pub fn inflation_size(key_presses: u32, target_presses: Option<u32>) -> f32 {
    let reference = target_presses.filter(|t| *t > 0).unwrap_or(TARGET_PRESSES);
    1.0 + (key_presses as f32 / reference as f32) * 2.0
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Player {
    pub id: ConnectionId,
    pub name: String,
    pub key_presses: u32,
    pub inflation_size: f32,
    pub final_height: f32,
    pub has_burst: bool,
    pub is_winner: bool,
    pub nut_type: NutType,
}

impl Player {
    pub fn new(id: ConnectionId, name: String) -> Self {
        Self {
            id,
            name,
            key_presses: 0,
            inflation_size: 1.0,
            final_height: 0.0,
            has_burst: false,
            is_winner: false,
            nut_type: NutType::for_connection(id),
        }
    }

    /// Clears per-round progress and rerolls the variant.
    pub fn reset_for_round(&mut self) {
        self.key_presses = 0;
        self.inflation_size = 1.0;
        self.final_height = 0.0;
        self.has_burst = false;
        self.is_winner = false;
        self.nut_type = NutType::for_connection(self.id);
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RoundConfig {
    pub round: u64,
    pub duration_ms: u64,
    pub target_presses: Option<u32>,
    /// Unix milliseconds at which the round began.
    pub start_time: u64,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct GameEndedPayload {
    pub winner: Option<Player>,
    pub players: PlayerMap,
    pub threshold_reached: bool,
}

/// Events sent from a browser or bot to the server.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(tag = "event", content = "data", rename_all = "camelCase")]
pub enum ClientEvent {
    KeyPress,
    UpdateName(String),
    UpdateNutType(NutType),
    StartGame,
}

/// Events sent from the server to clients.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(tag = "event", content = "data", rename_all = "camelCase")]
pub enum ServerEvent {
    CurrentPlayers(PlayerMap),
    NewPlayer(Player),
    UpdatePlayer(Player),
    PlayerDisconnected(ConnectionId),
    GameStarted(RoundConfig),
    GameEnded(GameEndedPayload),
    KickedForInactivity,
}

impl ClientEvent {
    pub fn encode(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    pub fn decode(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }
}

impl ServerEvent {
    pub fn encode(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    pub fn decode(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }

    /// Wire name of the event, as used in the `event` field.
    pub fn name(&self) -> &'static str {
        match self {
            ServerEvent::CurrentPlayers(_) => "currentPlayers",
            ServerEvent::NewPlayer(_) => "newPlayer",
            ServerEvent::UpdatePlayer(_) => "updatePlayer",
            ServerEvent::PlayerDisconnected(_) => "playerDisconnected",
            ServerEvent::GameStarted(_) => "gameStarted",
            ServerEvent::GameEnded(_) => "gameEnded",
            ServerEvent::KickedForInactivity => "kickedForInactivity",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_approx_eq::assert_approx_eq;

    #[test]
    fn test_eviction_waits_for_end_animation() {
        assert!(EVICTION_DELAY_MS > END_ANIMATION_MS);
        assert_eq!(EVICTION_DELAY_MS, 5_500);
    }

    #[test]
    fn test_player_defaults() {
        let player = Player::new(7, "Player 1".to_string());
        assert_eq!(player.id, 7);
        assert_eq!(player.key_presses, 0);
        assert_eq!(player.inflation_size, 1.0);
        assert_eq!(player.final_height, 0.0);
        assert!(!player.has_burst);
        assert!(!player.is_winner);
        assert_eq!(player.nut_type, NutType::for_connection(7));
    }

    #[test]
    fn test_reset_for_round() {
        let mut player = Player::new(3, "Player 1".to_string());
        player.key_presses = 42;
        player.inflation_size = 1.84;
        player.final_height = 12.0;
        player.has_burst = true;
        player.is_winner = true;
        player.nut_type = NutType::Cashew;

        player.reset_for_round();

        assert_eq!(player.key_presses, 0);
        assert_eq!(player.inflation_size, 1.0);
        assert_eq!(player.final_height, 0.0);
        assert!(!player.has_burst);
        assert!(!player.is_winner);
        assert_eq!(player.nut_type, NutType::for_connection(3));
        assert_eq!(player.name, "Player 1");
    }

    #[test]
    fn test_hash_code_matches_reference_values() {
        assert_eq!(hash_code(""), 0);
        assert_eq!(hash_code("a"), 97);
        assert_eq!(hash_code("ab"), 97 * 31 + 98);
        // "1" = 49, "12" = 49 * 31 + 50
        assert_eq!(hash_code("12"), 1569);
    }

    #[test]
    fn test_hash_code_wraps_on_overflow() {
        let long = "z".repeat(64);
        // Must not panic in debug builds.
        let _ = hash_code(&long);
    }

    #[test]
    fn test_nut_type_is_deterministic() {
        for id in 0..50 {
            assert_eq!(NutType::for_connection(id), NutType::for_connection(id));
        }
        // "1" hashes to 49, 49 % 6 == 1
        assert_eq!(NutType::for_connection(1), NutType::Peanut);
        // "12" hashes to 1569, 1569 % 6 == 3
        assert_eq!(NutType::for_connection(12), NutType::Pistachio);
    }

    #[test]
    fn test_inflation_size_is_monotonic() {
        let mut previous = inflation_size(0, Some(100));
        assert_approx_eq!(previous, 1.0, 1e-6);
        for presses in 1..=150 {
            let size = inflation_size(presses, Some(100));
            assert!(size > previous);
            previous = size;
        }
        assert_approx_eq!(inflation_size(100, Some(100)), 3.0, 1e-6);
        assert_approx_eq!(inflation_size(5, Some(10)), 2.0, 1e-6);
    }

    #[test]
    fn test_inflation_size_without_target() {
        assert_approx_eq!(inflation_size(50, None), 2.0, 1e-6);
        assert_approx_eq!(inflation_size(50, Some(0)), 2.0, 1e-6);
    }

    #[test]
    fn test_unit_event_wire_format() {
        assert_eq!(ClientEvent::KeyPress.encode().unwrap(), r#"{"event":"keyPress"}"#);
        assert_eq!(
            ClientEvent::decode(r#"{"event":"startGame"}"#).unwrap(),
            ClientEvent::StartGame
        );
        assert_eq!(
            ServerEvent::KickedForInactivity.encode().unwrap(),
            r#"{"event":"kickedForInactivity"}"#
        );
    }

    #[test]
    fn test_update_name_wire_format() {
        let event = ClientEvent::decode(r#"{"event":"updateName","data":"Ada"}"#).unwrap();
        assert_eq!(event, ClientEvent::UpdateName("Ada".to_string()));
    }

    #[test]
    fn test_update_nut_type_rejects_unknown_variant() {
        let event = ClientEvent::decode(r#"{"event":"updateNutType","data":"walnut"}"#).unwrap();
        assert_eq!(event, ClientEvent::UpdateNutType(NutType::Walnut));

        assert!(ClientEvent::decode(r#"{"event":"updateNutType","data":"coconut"}"#).is_err());
    }

    #[test]
    fn test_malformed_client_event() {
        assert!(ClientEvent::decode("").is_err());
        assert!(ClientEvent::decode("not json").is_err());
        assert!(ClientEvent::decode(r#"{"event":"jump"}"#).is_err());
    }

    #[test]
    fn test_player_field_names() {
        let player = Player::new(5, "Bo".to_string());
        let value = serde_json::to_value(&player).unwrap();
        for field in [
            "id",
            "name",
            "keyPresses",
            "inflationSize",
            "finalHeight",
            "hasBurst",
            "isWinner",
            "nutType",
        ] {
            assert!(value.get(field).is_some(), "missing field {}", field);
        }
    }

    #[test]
    fn test_player_map_uses_string_keys() {
        let mut players = PlayerMap::new();
        players.insert(2, Player::new(2, "Player 1".to_string()));
        let encoded = ServerEvent::CurrentPlayers(players.clone()).encode().unwrap();
        assert!(encoded.contains(r#""2":{"#));

        match ServerEvent::decode(&encoded).unwrap() {
            ServerEvent::CurrentPlayers(decoded) => assert_eq!(decoded, players),
            other => panic!("Unexpected event: {:?}", other),
        }
    }

    #[test]
    fn test_game_ended_without_winner() {
        let payload = GameEndedPayload {
            winner: None,
            players: PlayerMap::new(),
            threshold_reached: false,
        };
        let encoded = ServerEvent::GameEnded(payload).encode().unwrap();
        assert!(encoded.contains(r#""winner":null"#));
        assert!(encoded.contains(r#""thresholdReached":false"#));
    }

    #[test]
    fn test_event_names_match_wire_tag() {
        let events = vec![
            ServerEvent::PlayerDisconnected(9),
            ServerEvent::KickedForInactivity,
            ServerEvent::GameStarted(RoundConfig {
                round: 1,
                duration_ms: 30_000,
                target_presses: None,
                start_time: 0,
            }),
        ];
        for event in events {
            let value = serde_json::to_value(&event).unwrap();
            assert_eq!(value["event"], event.name());
        }
    }
}
