//! Explicit search state for the ε-greedy retry loop
//!
//! The random stream is never held in shared state. Each attempt receives a
//! `SearchState` by value, rebuilds its generator at the recorded stream
//! position, and hands back the advanced state when it is done. Replaying a
//! state therefore replays the attempt exactly.

use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

/// Exploration schedule `ε_r = min(1, ε_0 + r·Δ)`
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EpsilonSchedule {
    /// ε_0
    pub start: f64,
    /// Δ
    pub step: f64,
}

impl EpsilonSchedule {
    pub fn new(start: f64, step: f64) -> Self {
        Self { start, step }
    }

    /// ε for attempt `r`, clamped to `[0, 1]`
    pub fn at(&self, attempt: u32) -> f64 {
        (self.start + attempt as f64 * self.step).clamp(0.0, 1.0)
    }

    /// ε values for attempts `0..=last`
    pub fn values(&self, last: u32) -> Vec<f64> {
        (0..=last).map(|r| self.at(r)).collect()
    }
}

/// Search state threaded through the retry loop
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SearchState {
    /// Attempt index, starting at 0
    pub attempt: u32,
    /// Probability of shuffling an oversize cluster before splitting it
    pub epsilon: f64,
    seed: u64,
    word_pos: u128,
}

impl SearchState {
    /// State for attempt 0
    pub fn initial(seed: u64, schedule: &EpsilonSchedule) -> Self {
        Self {
            attempt: 0,
            epsilon: schedule.at(0),
            seed,
            word_pos: 0,
        }
    }

    /// Run seed
    pub fn seed(&self) -> u64 {
        self.seed
    }

    /// Position in the random stream, in 32-bit words
    pub fn stream_position(&self) -> u128 {
        self.word_pos
    }

    /// Generator positioned where the previous consumer stopped
    pub fn rng(&self) -> ChaCha8Rng {
        let mut rng = ChaCha8Rng::seed_from_u64(self.seed);
        rng.set_word_pos(self.word_pos);
        rng
    }

    /// Same attempt, stream advanced to wherever `rng` stopped
    pub fn resume_after(self, rng: &ChaCha8Rng) -> Self {
        Self {
            word_pos: rng.get_word_pos(),
            ..self
        }
    }

    /// State for the following attempt
    pub fn next_attempt(self, schedule: &EpsilonSchedule) -> Self {
        let attempt = self.attempt + 1;
        Self {
            attempt,
            epsilon: schedule.at(attempt),
            ..self
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::Rng;

    #[test]
    fn test_schedule_is_clamped() {
        let schedule = EpsilonSchedule::new(0.1, 0.4);
        assert_eq!(schedule.at(0), 0.1);
        assert!((schedule.at(1) - 0.5).abs() < 1e-12);
        assert_eq!(schedule.at(3), 1.0);
        assert_eq!(schedule.values(2).len(), 3);
    }

    #[test]
    fn test_state_replays_stream() {
        let schedule = EpsilonSchedule::new(0.0, 0.2);
        let state = SearchState::initial(7, &schedule);

        let mut rng = state.rng();
        let first: u64 = rng.gen_range(0..u64::MAX);
        let advanced = state.resume_after(&rng);

        let mut replay = state.rng();
        assert_eq!(replay.gen_range(0..u64::MAX), first);

        let mut rest = advanced.rng();
        assert_eq!(rest.gen_range(0..u64::MAX), rng.gen_range(0..u64::MAX));
    }

    #[test]
    fn test_next_attempt_updates_epsilon() {
        let schedule = EpsilonSchedule::new(0.0, 0.25);
        let state = SearchState::initial(1, &schedule).next_attempt(&schedule).next_attempt(&schedule);
        assert_eq!(state.attempt, 2);
        assert_eq!(state.epsilon, 0.5);
        assert_eq!(state.seed(), 1);
    }
}
