//! Simulation tuning shared by the game state and the network server.

use crate::error::GameError;
use shared::{DEFAULT_FOOD_COUNT, DEFAULT_GRID_SIZE, DEFAULT_START_LENGTH, FOOD_REWARD};
use std::time::Duration;

pub const MIN_GRID_SIZE: i32 = 2;
/// Largest grid whose fully occupied snapshot still fits in one datagram.
pub const MAX_GRID_SIZE: i32 = 88;

/// Rules and timing of one arena.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GameConfig {
    /// Width and height of the square toroidal grid.
    pub grid_size: i32,
    /// Number of food items kept on the grid.
    pub food_count: usize,
    /// Score added per food item eaten.
    pub food_reward: u32,
    /// Body length of a freshly spawned snake.
    pub start_length: usize,
    /// Ghost period between death and respawn.
    pub respawn_delay_ticks: u64,
    pub ticks_per_second: u32,
    /// Rejection-sampling budget before the allocator falls back to a scan.
    pub spawn_attempts: u32,
    /// Fixed RNG seed for reproducible runs.
    pub seed: Option<u64>,
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            grid_size: DEFAULT_GRID_SIZE,
            food_count: DEFAULT_FOOD_COUNT,
            food_reward: FOOD_REWARD,
            start_length: DEFAULT_START_LENGTH,
            respawn_delay_ticks: 30,
            ticks_per_second: 10,
            spawn_attempts: 64,
            seed: None,
        }
    }
}

impl GameConfig {
    pub fn tick_duration(&self) -> Duration {
        Duration::from_secs_f64(1.0 / self.ticks_per_second.max(1) as f64)
    }

    /// Converts a wall-clock respawn delay into ticks at the configured rate.
    pub fn with_respawn_delay_secs(mut self, secs: u64) -> Self {
        self.respawn_delay_ticks = secs.saturating_mul(self.ticks_per_second as u64);
        self
    }

    pub fn cell_count(&self) -> usize {
        (self.grid_size as usize) * (self.grid_size as usize)
    }

    pub fn validate(&self) -> Result<(), GameError> {
        if !(MIN_GRID_SIZE..=MAX_GRID_SIZE).contains(&self.grid_size) {
            return Err(GameError::InvalidConfig(format!(
                "grid size {} outside {}..={}",
                self.grid_size, MIN_GRID_SIZE, MAX_GRID_SIZE
            )));
        }
        if self.food_count == 0 || self.food_count >= self.cell_count() {
            return Err(GameError::InvalidConfig(format!(
                "food count {} must be between 1 and {}",
                self.food_count,
                self.cell_count() - 1
            )));
        }
        if self.start_length == 0 || self.start_length > self.grid_size as usize {
            return Err(GameError::InvalidConfig(format!(
                "start length {} must be between 1 and {}",
                self.start_length, self.grid_size
            )));
        }
        if self.ticks_per_second == 0 {
            return Err(GameError::InvalidConfig(
                "tick rate must be positive".to_string(),
            ));
        }
        if self.spawn_attempts == 0 {
            return Err(GameError::InvalidConfig(
                "spawn attempts must be positive".to_string(),
            ));
        }
        Ok(())
    }
}
