//! Owner of the live snakes and food items.

use shared::{Snake, Vector2};
use std::collections::BTreeMap;

/// Read-only projection of the world taken at the end of a tick.
///
/// Shared with the network layer behind an `Arc`; it is never mutated
/// after publication.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WorldSnapshot {
    pub tick: u64,
    pub players: Vec<Snake>,
    pub food: Vec<Vector2>,
}

/// Live snakes keyed by client id, plus the food on the grid.
///
/// Snakes are kept in a `BTreeMap` so every iteration, and therefore every
/// snapshot, lists players in id order.
#[derive(Debug, Default, Clone)]
pub struct EntityStore {
    snakes: BTreeMap<u32, Snake>,
    food: Vec<Vector2>,
}

impl EntityStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a snake, returning the one it replaced, if any.
    pub fn insert(&mut self, snake: Snake) -> Option<Snake> {
        self.snakes.insert(snake.id, snake)
    }

    pub fn remove(&mut self, id: u32) -> Option<Snake> {
        self.snakes.remove(&id)
    }

    pub fn get(&self, id: u32) -> Option<&Snake> {
        self.snakes.get(&id)
    }

    pub fn get_mut(&mut self, id: u32) -> Option<&mut Snake> {
        self.snakes.get_mut(&id)
    }

    pub fn snakes(&self) -> impl Iterator<Item = &Snake> {
        self.snakes.values()
    }

    pub fn len(&self) -> usize {
        self.snakes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.snakes.is_empty()
    }

    pub fn food(&self) -> &[Vector2] {
        &self.food
    }

    pub fn add_food(&mut self, pos: Vector2) {
        self.food.push(pos);
    }

    /// Replaces every food item, e.g. for scripted scenarios.
    pub fn set_food(&mut self, food: Vec<Vector2>) {
        self.food = food;
    }

    /// Removes the food item at `pos`. Returns false if there was none.
    pub fn consume_food(&mut self, pos: Vector2) -> bool {
        match self.food.iter().position(|&f| f == pos) {
            Some(index) => {
                self.food.swap_remove(index);
                true
            }
            None => false,
        }
    }

    pub fn snapshot(&self, tick: u64) -> WorldSnapshot {
        WorldSnapshot {
            tick,
            players: self.snakes.values().cloned().collect(),
            food: self.food.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::Direction;

    fn snake(id: u32, x: i32, y: i32) -> Snake {
        Snake::new(
            id,
            id,
            "green".to_string(),
            Direction::Right,
            [Vector2::new(x, y)],
        )
    }

    #[test]
    fn test_insert_and_remove() {
        let mut store = EntityStore::new();
        assert!(store.insert(snake(1, 0, 0)).is_none());
        assert!(store.insert(snake(2, 5, 5)).is_none());
        assert_eq!(store.len(), 2);
        assert!(store.get(1).is_some());

        let removed = store.remove(1).unwrap();
        assert_eq!(removed.id, 1);
        assert!(store.get(1).is_none());
        assert!(store.remove(1).is_none());
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_insert_replaces_same_id() {
        let mut store = EntityStore::new();
        store.insert(snake(1, 0, 0));
        let previous = store.insert(snake(1, 3, 3)).unwrap();

        assert_eq!(previous.head(), Vector2::new(0, 0));
        assert_eq!(store.get(1).unwrap().head(), Vector2::new(3, 3));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_food_consumption() {
        let mut store = EntityStore::new();
        store.set_food(vec![Vector2::new(1, 1), Vector2::new(2, 2)]);

        assert!(store.food().contains(&Vector2::new(2, 2)));
        assert!(store.consume_food(Vector2::new(2, 2)));
        assert!(!store.consume_food(Vector2::new(2, 2)));
        assert_eq!(store.food(), &[Vector2::new(1, 1)]);

        store.add_food(Vector2::new(4, 4));
        assert_eq!(store.food().len(), 2);
    }

    #[test]
    fn test_snapshot_is_ordered_and_detached() {
        let mut store = EntityStore::new();
        store.insert(snake(7, 7, 7));
        store.insert(snake(2, 2, 2));
        store.add_food(Vector2::new(9, 9));

        let snapshot = store.snapshot(12);
        store.get_mut(2).unwrap().score = 50;
        store.remove(7);

        assert_eq!(snapshot.tick, 12);
        assert_eq!(
            snapshot.players.iter().map(|s| s.id).collect::<Vec<_>>(),
            vec![2, 7]
        );
        assert_eq!(snapshot.players[0].score, 0);
        assert_eq!(snapshot.food, vec![Vector2::new(9, 9)]);
    }
}
