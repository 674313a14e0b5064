//! Per-connection join, death, respawn and leave transitions.
//!
//! A session moves through `Joining -> Active -> RespawnPending -> Active ...`
//! until the client leaves. While a session is `RespawnPending` its snake is
//! absent from the entity store (ghost period), so it can neither collide
//! nor be collided with.

use crate::config::GameConfig;
use crate::entity_store::EntityStore;
use crate::grid::OccupancyIndex;
use crate::simulation::Death;
use crate::spawn::SpawnAllocator;
use log::{debug, info, warn};
use rand::Rng;
use shared::{Direction, Snake, Turn, Vector2};
use std::collections::{BTreeMap, BTreeSet};

pub const PALETTE: [&str; 8] = [
    "blue", "red", "green", "purple", "orange", "cyan", "magenta", "yellow",
];

/// Cosmetic color, fixed for the lifetime of a connection.
pub fn generate_color(client_id: u32) -> String {
    PALETTE[(client_id.max(1) as usize - 1) % PALETTE.len()].to_string()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Connected, waiting for a free start position.
    Joining,
    Active,
    /// Dead; the snake comes back at `respawn_tick`.
    RespawnPending { respawn_tick: u64 },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub client_id: u32,
    pub display_number: u32,
    pub color: String,
    pub phase: Phase,
    pub deaths: u32,
    last_countdown: Option<u32>,
}

/// Pool of player numbers: always hands out the smallest free positive one.
#[derive(Debug, Default, Clone)]
pub struct DisplayNumbers {
    held: BTreeSet<u32>,
}

impl DisplayNumbers {
    pub fn acquire(&mut self) -> u32 {
        let mut number = 1;
        while self.held.contains(&number) {
            number += 1;
        }
        self.held.insert(number);
        number
    }

    pub fn release(&mut self, number: u32) -> bool {
        self.held.remove(&number)
    }
}

/// Notifications for the transport, produced while a tick is processed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GameEvent {
    /// First spawn of a connection; the joiner gets the full world.
    Joined {
        snake: Snake,
        players: Vec<Snake>,
        food: Vec<Vector2>,
    },
    Respawned {
        snake: Snake,
    },
    Died {
        client_id: u32,
        score: u32,
    },
    Countdown {
        client_id: u32,
        seconds_remaining: u32,
    },
    Left {
        client_id: u32,
    },
}

#[derive(Debug)]
pub struct LifecycleManager {
    sessions: BTreeMap<u32, Session>,
    numbers: DisplayNumbers,
    grid_size: i32,
    start_length: usize,
    respawn_delay_ticks: u64,
    ticks_per_second: u32,
}

impl LifecycleManager {
    pub fn new(config: &GameConfig) -> Self {
        Self {
            sessions: BTreeMap::new(),
            numbers: DisplayNumbers::default(),
            grid_size: config.grid_size,
            start_length: config.start_length,
            respawn_delay_ticks: config.respawn_delay_ticks,
            ticks_per_second: config.ticks_per_second.max(1),
        }
    }

    /// Opens a session for `client_id`. The snake itself appears on the next
    /// call to [`advance`](Self::advance) that finds room for it.
    ///
    /// Returns the assigned display number, or `None` if the client already
    /// has a session.
    pub fn join(&mut self, client_id: u32) -> Option<u32> {
        if self.sessions.contains_key(&client_id) {
            debug!("Ignoring duplicate join from client {}", client_id);
            return None;
        }

        let display_number = self.numbers.acquire();
        self.sessions.insert(
            client_id,
            Session {
                client_id,
                display_number,
                color: generate_color(client_id),
                phase: Phase::Joining,
                deaths: 0,
                last_countdown: None,
            },
        );
        info!("Client {} joined as player {}", client_id, display_number);
        Some(display_number)
    }

    /// Ends a session immediately, whatever its phase.
    pub fn leave(
        &mut self,
        client_id: u32,
        store: &mut EntityStore,
        events: &mut Vec<GameEvent>,
    ) -> bool {
        let Some(session) = self.sessions.remove(&client_id) else {
            debug!("Ignoring leave for unknown client {}", client_id);
            return false;
        };

        self.numbers.release(session.display_number);
        store.remove(client_id);
        events.push(GameEvent::Left { client_id });
        info!(
            "Client {} left, player number {} released",
            client_id, session.display_number
        );
        true
    }

    /// Applies a turn to an active snake. Anything else is a no-op.
    pub fn turn(&self, client_id: u32, turn: Turn, store: &mut EntityStore) -> bool {
        let active = matches!(
            self.sessions.get(&client_id).map(|session| session.phase),
            Some(Phase::Active)
        );
        if !active {
            return false;
        }

        store
            .get_mut(client_id)
            .map_or(false, |snake| snake.turn(turn, self.grid_size))
    }

    /// Starts the ghost period for a snake the simulation just removed.
    pub fn on_death(&mut self, death: &Death, tick: u64, events: &mut Vec<GameEvent>) {
        let client_id = death.snake.id;
        let Some(session) = self.sessions.get_mut(&client_id) else {
            return;
        };

        session.phase = Phase::RespawnPending {
            respawn_tick: tick.saturating_add(self.respawn_delay_ticks),
        };
        session.deaths += 1;
        session.last_countdown = None;
        events.push(GameEvent::Died {
            client_id,
            score: death.snake.score,
        });
    }

    /// Spawns every joining or due session and emits countdowns for the rest.
    ///
    /// `occupancy` must reflect the current store; it is updated in place as
    /// snakes are placed so two sessions never receive overlapping bodies.
    /// Sessions that do not fit stay in their phase and are retried later.
    pub fn advance<R: Rng>(
        &mut self,
        tick: u64,
        store: &mut EntityStore,
        occupancy: &mut OccupancyIndex,
        allocator: &mut SpawnAllocator<R>,
        events: &mut Vec<GameEvent>,
    ) {
        for session in self.sessions.values_mut() {
            let first_spawn = match session.phase {
                Phase::Active => continue,
                Phase::RespawnPending { respawn_tick } if tick < respawn_tick => {
                    let remaining = respawn_tick - tick;
                    let per_second = self.ticks_per_second as u64;
                    let whole = remaining / per_second + u64::from(remaining % per_second != 0);
                    let seconds = u32::try_from(whole).unwrap_or(u32::MAX);
                    if session.last_countdown != Some(seconds) {
                        session.last_countdown = Some(seconds);
                        events.push(GameEvent::Countdown {
                            client_id: session.client_id,
                            seconds_remaining: seconds,
                        });
                    }
                    continue;
                }
                Phase::Joining => true,
                Phase::RespawnPending { .. } => false,
            };

            let direction = Direction::default();
            let body = match allocator.free_body(
                occupancy,
                store.food(),
                direction,
                self.start_length,
            ) {
                Ok(body) => body,
                Err(e) => {
                    warn!("Deferring spawn of client {}: {}", session.client_id, e);
                    continue;
                }
            };

            let snake = Snake::new(
                session.client_id,
                session.display_number,
                session.color.clone(),
                direction,
                body,
            );
            occupancy.insert_body(&snake);
            store.insert(snake.clone());
            session.phase = Phase::Active;
            session.last_countdown = None;

            debug!("Spawned client {} at {:?}", session.client_id, snake.head());

            if first_spawn {
                events.push(GameEvent::Joined {
                    players: store.snakes().cloned().collect(),
                    food: store.food().to_vec(),
                    snake,
                });
            } else {
                events.push(GameEvent::Respawned { snake });
            }
        }
    }

    pub fn session(&self, client_id: u32) -> Option<&Session> {
        self.sessions.get(&client_id)
    }

    pub fn phase(&self, client_id: u32) -> Option<Phase> {
        self.sessions.get(&client_id).map(|session| session.phase)
    }

    pub fn sessions(&self) -> impl Iterator<Item = &Session> {
        self.sessions.values()
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}
