//! One fixed-period advance of every snake on the grid.
//!
//! All candidate heads are computed from the pre-move world before any body
//! changes, so the outcome does not depend on the order snakes are visited.

use crate::config::GameConfig;
use crate::entity_store::EntityStore;
use crate::grid::OccupancyIndex;
use crate::spawn::SpawnAllocator;
use log::{debug, warn};
use rand::Rng;
use shared::{Snake, Vector2};
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeathCause {
    /// Two or more snakes moved into the same cell.
    HeadOn,
    /// Moved into a cell of its own pre-move body.
    SelfCollision,
    /// Moved into a cell of another snake's pre-move body.
    Body,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Death {
    /// The snake as it was before the fatal move.
    pub snake: Snake,
    pub cause: DeathCause,
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct StepOutcome {
    /// Snakes removed from the store this tick, in id order.
    pub deaths: Vec<Death>,
    /// Ids of snakes that ate this tick.
    pub fed: Vec<u32>,
    /// Food items that could not be placed back on the grid.
    pub food_missing: usize,
}

impl StepOutcome {
    pub fn dead_ids(&self) -> Vec<u32> {
        self.deaths.iter().map(|death| death.snake.id).collect()
    }
}

/// Moves every snake one cell, resolves collisions and food.
///
/// Dead snakes are taken out of `store` and handed back in the outcome;
/// the caller decides when they return. On exit `occupancy` reflects the
/// post-move bodies and eaten food has been replaced.
pub fn step<R: Rng>(
    store: &mut EntityStore,
    occupancy: &mut OccupancyIndex,
    allocator: &mut SpawnAllocator<R>,
    config: &GameConfig,
) -> StepOutcome {
    occupancy.rebuild(store.snakes());

    let candidates: Vec<(u32, Vector2)> = store
        .snakes()
        .map(|snake| (snake.id, snake.head().step(snake.direction, config.grid_size)))
        .collect();

    let mut heads: HashMap<Vector2, usize> = HashMap::with_capacity(candidates.len());
    for &(_, head) in &candidates {
        *heads.entry(head).or_insert(0) += 1;
    }

    let mut dead: Vec<(u32, DeathCause)> = Vec::new();
    let mut moves: Vec<(u32, Vector2)> = Vec::with_capacity(candidates.len());
    for (id, head) in candidates {
        if heads.get(&head).copied().unwrap_or(0) > 1 {
            dead.push((id, DeathCause::HeadOn));
        } else if occupancy.occupied(head) {
            let own = store.get(id).map_or(false, |snake| snake.contains(head));
            let cause = if own {
                DeathCause::SelfCollision
            } else {
                DeathCause::Body
            };
            dead.push((id, cause));
        } else {
            moves.push((id, head));
        }
    }

    let mut outcome = StepOutcome::default();

    for (id, head) in moves {
        let ate = store.consume_food(head);
        if let Some(snake) = store.get_mut(id) {
            snake.advance(head, ate);
            if ate {
                snake.score = snake.score.saturating_add(config.food_reward);
                outcome.fed.push(id);
            }
        }
    }

    for (id, cause) in dead {
        if let Some(snake) = store.remove(id) {
            debug!(
                "Snake {} died ({:?}) at {:?} with score {}",
                id,
                cause,
                snake.head(),
                snake.score
            );
            outcome.deaths.push(Death { snake, cause });
        }
    }

    occupancy.rebuild(store.snakes());
    outcome.food_missing = replenish_food(store, occupancy, allocator, config.food_count);
    outcome
}

/// Tops the food list up to `target` items on free cells.
///
/// Returns how many items are still missing because the grid had no room.
pub fn replenish_food<R: Rng>(
    store: &mut EntityStore,
    occupancy: &OccupancyIndex,
    allocator: &mut SpawnAllocator<R>,
    target: usize,
) -> usize {
    while store.food().len() < target {
        match allocator.free_position(occupancy, store.food()) {
            Ok(pos) => store.add_food(pos),
            Err(e) => {
                warn!("Could not place food: {}", e);
                break;
            }
        }
    }
    target.saturating_sub(store.food().len())
}
