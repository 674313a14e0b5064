use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

pub const PROTOCOL_VERSION: u32 = 1;
pub const DEFAULT_GRID_SIZE: i32 = 20;
pub const DEFAULT_FOOD_COUNT: usize = 3;
pub const FOOD_REWARD: u32 = 1;
pub const DEFAULT_START_LENGTH: usize = 1;
pub const MAX_DATAGRAM_SIZE: usize = 65_507;

/// Integer cell coordinate on the toroidal grid.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize,
)]
pub struct Vector2 {
    pub x: i32,
    pub y: i32,
}

impl Vector2 {
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    pub fn add(&self, other: Vector2) -> Vector2 {
        Vector2 {
            x: self.x + other.x,
            y: self.y + other.y,
        }
    }

    /// Maps the coordinate back into `[0, size) x [0, size)`.
    pub fn wrap(&self, size: i32) -> Vector2 {
        Vector2 {
            x: self.x.rem_euclid(size),
            y: self.y.rem_euclid(size),
        }
    }

    /// The neighbouring cell in `direction`, wrapped around the grid edges.
    pub fn step(&self, direction: Direction, size: i32) -> Vector2 {
        self.add(direction.vector()).wrap(size)
    }
}

/// Heading of a snake. Screen coordinates: `Up` decreases y.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Direction {
    Up,
    Down,
    Left,
    #[default]
    Right,
}

impl Direction {
    pub const ALL: [Direction; 4] = [
        Direction::Up,
        Direction::Down,
        Direction::Left,
        Direction::Right,
    ];

    pub fn vector(self) -> Vector2 {
        match self {
            Direction::Up => Vector2::new(0, -1),
            Direction::Down => Vector2::new(0, 1),
            Direction::Left => Vector2::new(-1, 0),
            Direction::Right => Vector2::new(1, 0),
        }
    }

    pub fn opposite(self) -> Direction {
        match self {
            Direction::Up => Direction::Down,
            Direction::Down => Direction::Up,
            Direction::Left => Direction::Right,
            Direction::Right => Direction::Left,
        }
    }

    /// Quarter turn clockwise as seen on screen.
    pub fn rotate_right(self) -> Direction {
        match self {
            Direction::Up => Direction::Right,
            Direction::Right => Direction::Down,
            Direction::Down => Direction::Left,
            Direction::Left => Direction::Up,
        }
    }

    pub fn rotate_left(self) -> Direction {
        self.rotate_right().opposite()
    }

    /// Resolves a turn intent against this heading.
    ///
    /// Returns `None` when the intent asks for a direct reversal, which is
    /// never legal. Relative turns always resolve.
    pub fn apply(self, turn: Turn) -> Option<Direction> {
        match turn {
            Turn::Absolute(direction) if direction == self.opposite() => None,
            Turn::Absolute(direction) => Some(direction),
            Turn::Left => Some(self.rotate_left()),
            Turn::Right => Some(self.rotate_right()),
        }
    }
}

/// Direction change requested by a client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Turn {
    Absolute(Direction),
    Left,
    Right,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snake {
    pub id: u32,
    pub display_number: u32,
    pub direction: Direction,
    /// Head first.
    pub body: VecDeque<Vector2>,
    pub score: u32,
    pub color: String,
}

impl Snake {
    pub fn new(
        id: u32,
        display_number: u32,
        color: String,
        direction: Direction,
        body: impl IntoIterator<Item = Vector2>,
    ) -> Self {
        Self {
            id,
            display_number,
            direction,
            body: body.into_iter().collect(),
            score: 0,
            color,
        }
    }

    pub fn head(&self) -> Vector2 {
        self.body.front().copied().unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.body.len()
    }

    pub fn is_empty(&self) -> bool {
        self.body.is_empty()
    }

    pub fn contains(&self, pos: Vector2) -> bool {
        self.body.contains(&pos)
    }

    /// Applies a turn intent. Returns false if it was rejected as a reversal.
    ///
    /// Several turns may arrive between two moves, so a turn is also
    /// rejected when it would send the head into the neck cell on a grid of
    /// `size`.
    pub fn turn(&mut self, turn: Turn, size: i32) -> bool {
        let Some(direction) = self.direction.apply(turn) else {
            return false;
        };
        if let Some(&neck) = self.body.get(1) {
            if self.head().step(direction, size) == neck {
                return false;
            }
        }
        self.direction = direction;
        true
    }

    /// Moves the head onto `next`. The tail is kept only when `grow` is set.
    pub fn advance(&mut self, next: Vector2, grow: bool) {
        self.body.push_front(next);
        if !grow {
            self.body.pop_back();
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub enum Packet {
    Connect {
        client_version: u32,
    },
    Turn {
        turn: Turn,
    },
    Heartbeat,
    Disconnect,

    Connected {
        client_id: u32,
    },
    Init {
        client_id: u32,
        snake: Snake,
        players: Vec<Snake>,
        food: Vec<Vector2>,
    },
    NewPlayer {
        snake: Snake,
    },
    GameState {
        tick: u64,
        timestamp: u64,
        players: Vec<Snake>,
        food: Vec<Vector2>,
    },
    PlayerDied {
        client_id: u32,
        score: u32,
    },
    Countdown {
        client_id: u32,
        seconds_remaining: u32,
    },
    PlayerLeft {
        client_id: u32,
    },
    Disconnected {
        reason: String,
    },
}
