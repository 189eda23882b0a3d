//! Round state and outcome computation for the single global room.
//!
//! A [`Round`] only tracks phase and timing. Scoring lives in
//! [`apply_outcome`], which is a pure function over the player registry so
//! it can be exercised without a runtime.

use log::info;
use shared::{ConnectionId, PlayerMap, MAX_FINAL_HEIGHT, REFERENCE_TARGET_RATIO};
use tokio::task::JoinHandle;
use tokio::time::{Duration, Instant};

#[derive(Debug)]
pub struct Round {
    /// Incremented each time a round begins. Timer messages carry it so a
    /// stale timer can be told apart from the current one.
    pub number: u64,
    pub is_active: bool,
    pub start_time: Option<Instant>,
    pub duration: Duration,
    pub target_presses: Option<u32>,
    pending_timeout: Option<JoinHandle<()>>,
}

impl Round {
    pub fn new(duration: Duration, target_presses: Option<u32>) -> Self {
        Self {
            number: 0,
            is_active: false,
            start_time: None,
            duration,
            target_presses,
            pending_timeout: None,
        }
    }

    /// Moves the round to the active phase and returns its number.
    pub fn begin(&mut self) -> u64 {
        self.number += 1;
        self.is_active = true;
        self.start_time = Some(Instant::now());
        info!("Round {} started", self.number);
        self.number
    }

    /// Takes ownership of the scheduled end-of-round task.
    pub fn set_pending_timeout(&mut self, handle: JoinHandle<()>) {
        if let Some(previous) = self.pending_timeout.replace(handle) {
            previous.abort();
        }
    }

    pub fn has_pending_timeout(&self) -> bool {
        self.pending_timeout.is_some()
    }

    /// Cancels the pending timeout and returns to idle.
    ///
    /// Returns false if the round was not active, which makes repeated calls
    /// harmless.
    pub fn finish(&mut self) -> bool {
        if !self.is_active {
            return false;
        }

        if let Some(handle) = self.pending_timeout.take() {
            handle.abort();
        }
        self.is_active = false;
        true
    }

    /// True while `number` identifies the round in progress.
    pub fn is_current(&self, number: u64) -> bool {
        self.is_active && self.number == number
    }

    pub fn elapsed(&self) -> Option<Duration> {
        self.start_time.map(|start| start.elapsed())
    }
}

/// Result of scoring a finished round.
#[derive(Debug, Clone, PartialEq)]
pub struct Outcome {
    pub winner: Option<ConnectionId>,
    pub threshold_reached: bool,
    /// Players that never pressed during the round.
    pub inactive: Vec<ConnectionId>,
}

/// Player with the strictly highest press count.
///
/// Ties go to the earliest registration (lowest id). A room where nobody
/// pressed has no winner.
pub fn find_winner(players: &PlayerMap) -> Option<ConnectionId> {
    let mut best: Option<(ConnectionId, u32)> = None;
    for (id, player) in players {
        if player.key_presses == 0 {
            continue;
        }
        match best {
            Some((_, presses)) if player.key_presses <= presses => {}
            _ => best = Some((*id, player.key_presses)),
        }
    }
    best.map(|(id, _)| id)
}

/// Denominator used to scale every player's final height.
pub fn reference_presses(winner_presses: u32, target_presses: Option<u32>) -> f32 {
    let winner_presses = winner_presses as f32;
    match target_presses {
        Some(target) => winner_presses.max(target as f32 * REFERENCE_TARGET_RATIO),
        None => winner_presses,
    }
}

pub fn final_height(key_presses: u32, reference: f32) -> f32 {
    if reference <= 0.0 {
        return 0.0;
    }
    (key_presses as f32 / reference * MAX_FINAL_HEIGHT).clamp(0.0, MAX_FINAL_HEIGHT)
}

/// Scores the round in place: winner flag, final heights and burst flags.
///
/// `explicit_winner` is honoured only while it is still registered;
/// otherwise the winner is recomputed from the scores.
pub fn apply_outcome(
    players: &mut PlayerMap,
    explicit_winner: Option<ConnectionId>,
    target_presses: Option<u32>,
) -> Outcome {
    let winner = explicit_winner
        .filter(|id| players.contains_key(id))
        .or_else(|| find_winner(players));

    let winner_presses = winner
        .and_then(|id| players.get(&id))
        .map_or(0, |player| player.key_presses);
    let reference = reference_presses(winner_presses, target_presses);

    let mut inactive = Vec::new();
    for (id, player) in players.iter_mut() {
        player.final_height = final_height(player.key_presses, reference);
        player.has_burst = player.key_presses > 0
            && target_presses.is_some_and(|target| player.key_presses >= target);
        player.is_winner = Some(*id) == winner;

        if player.key_presses == 0 {
            inactive.push(*id);
        }
    }

    let threshold_reached = winner_presses > 0
        && target_presses.is_some_and(|target| winner_presses >= target);

    Outcome {
        winner,
        threshold_reached,
        inactive,
    }
}
