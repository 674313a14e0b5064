//! Collision-free placement of new snakes and food.

use crate::config::GameConfig;
use crate::error::GameError;
use crate::grid::OccupancyIndex;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use shared::{Direction, Vector2};

/// Draws uniformly random free cells.
///
/// Sampling is rejection based with a fixed attempt budget. Once the budget
/// is spent the allocator scans the grid once and picks among whatever free
/// cells remain, so it never loops on a crowded grid and reports
/// [`GameError::SpawnExhausted`] only when nothing fits.
#[derive(Debug)]
pub struct SpawnAllocator<R = StdRng> {
    rng: R,
    grid_size: i32,
    max_attempts: u32,
}

impl SpawnAllocator<StdRng> {
    pub fn from_config(config: &GameConfig) -> Self {
        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Self::new(rng, config.grid_size, config.spawn_attempts)
    }
}

impl<R: Rng> SpawnAllocator<R> {
    pub fn new(rng: R, grid_size: i32, max_attempts: u32) -> Self {
        Self {
            rng,
            grid_size,
            max_attempts,
        }
    }

    /// A cell that is neither occupied by a body nor listed in `reserved`.
    pub fn free_position(
        &mut self,
        occupancy: &OccupancyIndex,
        reserved: &[Vector2],
    ) -> Result<Vector2, GameError> {
        self.sample(|pos| !occupancy.occupied(pos) && !reserved.contains(&pos))
    }

    /// A start body of `length` cells, head first, trailing away from
    /// `direction`. Every cell must be free.
    pub fn free_body(
        &mut self,
        occupancy: &OccupancyIndex,
        reserved: &[Vector2],
        direction: Direction,
        length: usize,
    ) -> Result<Vec<Vector2>, GameError> {
        let size = self.grid_size;
        let head = self.sample(|head| {
            body_cells(head, direction, length, size)
                .all(|pos| !occupancy.occupied(pos) && !reserved.contains(&pos))
        })?;
        Ok(body_cells(head, direction, length, size).collect())
    }

    fn sample(&mut self, mut accept: impl FnMut(Vector2) -> bool) -> Result<Vector2, GameError> {
        for _ in 0..self.max_attempts {
            let pos = Vector2::new(
                self.rng.gen_range(0..self.grid_size),
                self.rng.gen_range(0..self.grid_size),
            );
            if accept(pos) {
                return Ok(pos);
            }
        }

        let size = self.grid_size;
        let candidates: Vec<Vector2> = (0..size)
            .flat_map(|y| (0..size).map(move |x| Vector2::new(x, y)))
            .filter(|&pos| accept(pos))
            .collect();

        candidates
            .choose(&mut self.rng)
            .copied()
            .ok_or(GameError::SpawnExhausted {
                attempts: self.max_attempts,
            })
    }
}

fn body_cells(
    head: Vector2,
    direction: Direction,
    length: usize,
    size: i32,
) -> impl Iterator<Item = Vector2> {
    let back = direction.opposite().vector();
    (0..length as i32)
        .map(move |i| Vector2::new(head.x + back.x * i, head.y + back.y * i).wrap(size))
}
