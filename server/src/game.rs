use crate::config::GameConfig;
use crate::entity_store::{EntityStore, WorldSnapshot};
use crate::error::GameError;
use crate::grid::OccupancyIndex;
use crate::lifecycle::{GameEvent, LifecycleManager};
use crate::simulation::{self, StepOutcome};
use crate::spawn::SpawnAllocator;
use log::{debug, info};
use shared::Turn;
use std::sync::Arc;

/// Intents delivered by the transport on behalf of a connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GameCommand {
    Join { client_id: u32 },
    Turn { client_id: u32, turn: Turn },
    Leave { client_id: u32 },
}

/// Everything one tick produced for the transport.
#[derive(Debug, Clone)]
pub struct TickReport {
    pub events: Vec<GameEvent>,
    pub snapshot: Arc<WorldSnapshot>,
    pub outcome: StepOutcome,
}

/// The authoritative world.
///
/// Owns the entity store, occupancy index, spawn allocator and lifecycle
/// manager; nothing else holds a mutable reference to them. Turns take
/// effect immediately, joins and leaves are queued for the next tick
/// boundary so they never interleave with a step.
#[derive(Debug)]
pub struct GameState {
    pub tick: u64,
    config: GameConfig,
    store: EntityStore,
    occupancy: OccupancyIndex,
    allocator: SpawnAllocator,
    lifecycle: LifecycleManager,
    pending: Vec<GameCommand>,
    snapshot: Arc<WorldSnapshot>,
}

impl GameState {
    pub fn new(config: GameConfig) -> Result<Self, GameError> {
        config.validate()?;

        let mut store = EntityStore::new();
        let occupancy = OccupancyIndex::new();
        let mut allocator = SpawnAllocator::from_config(&config);
        simulation::replenish_food(&mut store, &occupancy, &mut allocator, config.food_count);

        info!(
            "World ready: {}x{} grid, {} food",
            config.grid_size,
            config.grid_size,
            store.food().len()
        );

        Ok(Self {
            tick: 0,
            lifecycle: LifecycleManager::new(&config),
            snapshot: Arc::new(store.snapshot(0)),
            config,
            store,
            occupancy,
            allocator,
            pending: Vec::new(),
        })
    }

    /// Accepts an intent. Invalid ones are dropped without error.
    pub fn submit(&mut self, cmd: GameCommand) {
        match cmd {
            GameCommand::Turn { client_id, turn } => {
                if !self.lifecycle.turn(client_id, turn, &mut self.store) {
                    debug!("Ignored turn {:?} from client {}", turn, client_id);
                }
            }
            GameCommand::Join { .. } | GameCommand::Leave { .. } => self.pending.push(cmd),
        }
    }

    /// Advances the world by one tick and publishes a fresh snapshot.
    pub fn tick(&mut self) -> TickReport {
        let tick = self.tick + 1;
        let mut events = Vec::new();

        for cmd in std::mem::take(&mut self.pending) {
            match cmd {
                GameCommand::Join { client_id } => {
                    self.lifecycle.join(client_id);
                }
                GameCommand::Leave { client_id } => {
                    self.lifecycle
                        .leave(client_id, &mut self.store, &mut events);
                }
                GameCommand::Turn { .. } => {}
            }
        }

        let outcome = simulation::step(
            &mut self.store,
            &mut self.occupancy,
            &mut self.allocator,
            &self.config,
        );
        for death in &outcome.deaths {
            self.lifecycle.on_death(death, tick, &mut events);
        }

        self.lifecycle.advance(
            tick,
            &mut self.store,
            &mut self.occupancy,
            &mut self.allocator,
            &mut events,
        );

        self.tick = tick;
        self.snapshot = Arc::new(self.store.snapshot(tick));

        TickReport {
            events,
            snapshot: Arc::clone(&self.snapshot),
            outcome,
        }
    }

    /// The snapshot published by the last tick.
    pub fn snapshot(&self) -> Arc<WorldSnapshot> {
        Arc::clone(&self.snapshot)
    }

    pub fn config(&self) -> &GameConfig {
        &self.config
    }

    pub fn store(&self) -> &EntityStore {
        &self.store
    }

    /// Direct access for scripted scenarios and tooling.
    pub fn store_mut(&mut self) -> &mut EntityStore {
        &mut self.store
    }

    pub fn lifecycle(&self) -> &LifecycleManager {
        &self.lifecycle
    }

    pub fn player_count(&self) -> usize {
        self.lifecycle.len()
    }
}
