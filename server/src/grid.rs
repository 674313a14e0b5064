//! Occupancy index over the toroidal grid.
//!
//! Tracks which cells hold a snake body segment. Cells are reference
//! counted so that incremental inserts and removes stay correct when two
//! bodies briefly share a cell, for example while the simulation step has
//! pushed a new head before the collision set has been cleared.

use shared::{Snake, Vector2};
use std::collections::HashMap;

#[derive(Debug, Default, Clone)]
pub struct OccupancyIndex {
    cells: HashMap<Vector2, u32>,
    segments: usize,
}

impl OccupancyIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Recomputes the occupied set from scratch in O(total segments).
    pub fn rebuild<'a>(&mut self, snakes: impl IntoIterator<Item = &'a Snake>) {
        self.cells.clear();
        self.segments = 0;
        for snake in snakes {
            self.insert_body(snake);
        }
    }

    pub fn insert(&mut self, pos: Vector2) {
        *self.cells.entry(pos).or_insert(0) += 1;
        self.segments += 1;
    }

    /// Drops one reference to `pos`. Returns false if the cell was free.
    pub fn remove(&mut self, pos: Vector2) -> bool {
        match self.cells.get_mut(&pos) {
            Some(count) if *count > 1 => {
                *count -= 1;
            }
            Some(_) => {
                self.cells.remove(&pos);
            }
            None => return false,
        }
        self.segments -= 1;
        true
    }

    pub fn insert_body(&mut self, snake: &Snake) {
        for &pos in &snake.body {
            self.insert(pos);
        }
    }

    pub fn occupied(&self, pos: Vector2) -> bool {
        self.cells.contains_key(&pos)
    }

    /// Number of segments counted, duplicates included.
    pub fn segment_count(&self) -> usize {
        self.segments
    }
}
