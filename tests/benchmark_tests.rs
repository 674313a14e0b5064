//! Performance benchmarks for critical game systems

use bincode::{deserialize, serialize};
use rand::rngs::StdRng;
use rand::SeedableRng;
use server::config::{GameConfig, MAX_GRID_SIZE};
use server::entity_store::EntityStore;
use server::game::{GameCommand, GameState};
use server::grid::OccupancyIndex;
use server::simulation;
use server::spawn::SpawnAllocator;
use shared::{Direction, Packet, Snake, Turn, Vector2};
use std::time::Instant;

/// Lays out `count` snakes in parallel rows so none of them collide
fn row_snakes(count: u32, length: i32) -> Vec<Snake> {
    (0..count)
        .map(|i| {
            let y = (i as i32) * 2;
            Snake::new(
                i + 1,
                i + 1,
                "green".to_string(),
                Direction::Right,
                (0..length).rev().map(move |x| Vector2::new(x, y)),
            )
        })
        .collect()
}

/// Benchmarks rebuilding the occupancy index from long snakes
#[test]
fn benchmark_occupancy_rebuild() {
    let snakes = row_snakes(64, 100);
    let mut occupancy = OccupancyIndex::new();

    let iterations = 1_000;
    let start = Instant::now();

    for _ in 0..iterations {
        occupancy.rebuild(&snakes);
    }

    let duration = start.elapsed();
    println!(
        "Occupancy rebuild: {} iterations in {:?} ({:.2} μs/iter)",
        iterations,
        duration,
        duration.as_micros() as f64 / iterations as f64
    );

    assert_eq!(occupancy.segment_count(), 6_400);
    // Should complete in under 5 seconds
    assert!(duration.as_secs() < 5);
}

/// Benchmarks a full simulation step with many snakes on the largest grid
#[test]
fn benchmark_simulation_step() {
    let config = GameConfig {
        grid_size: MAX_GRID_SIZE,
        food_count: 50,
        ..GameConfig::default()
    };
    let mut store = EntityStore::new();
    for snake in row_snakes(40, 20) {
        store.insert(snake);
    }
    let mut occupancy = OccupancyIndex::new();
    let mut allocator = SpawnAllocator::new(StdRng::seed_from_u64(5), config.grid_size, 64);

    let iterations = 1_000;
    let start = Instant::now();

    for _ in 0..iterations {
        let outcome = simulation::step(&mut store, &mut occupancy, &mut allocator, &config);
        assert!(outcome.deaths.is_empty());
    }

    let duration = start.elapsed();
    println!(
        "Simulation step: {} iterations in {:?} ({:.2} μs/iter)",
        iterations,
        duration,
        duration.as_micros() as f64 / iterations as f64
    );

    assert_eq!(store.len(), 40);
    // Should complete in under 10 seconds
    assert!(duration.as_secs() < 10);
}

/// Stress tests the tick loop with constant joins, turns and leaves
#[test]
fn stress_test_player_churn() {
    let mut game = GameState::new(GameConfig {
        grid_size: 32,
        respawn_delay_ticks: 5,
        seed: Some(21),
        ..GameConfig::default()
    })
    .unwrap();

    let iterations = 2_000u32;
    let start = Instant::now();

    for tick in 0..iterations {
        let client_id = tick % 40 + 1;
        if tick % 7 == 0 {
            game.submit(GameCommand::Leave { client_id });
        } else {
            game.submit(GameCommand::Join { client_id });
        }
        game.submit(GameCommand::Turn {
            client_id: (tick * 13) % 40 + 1,
            turn: if tick % 2 == 0 { Turn::Left } else { Turn::Right },
        });
        game.tick();
    }

    let duration = start.elapsed();
    println!(
        "Player churn: {} ticks in {:?} ({:.2} μs/tick)",
        iterations,
        duration,
        duration.as_micros() as f64 / iterations as f64
    );

    assert!(game.player_count() <= 40);
    assert!(duration.as_secs() < 10);
}

/// Benchmarks network packet serialization performance
#[test]
fn benchmark_packet_serialization() {
    let packet = Packet::GameState {
        tick: 12345,
        timestamp: 1234567890,
        players: row_snakes(50, 10),
        food: (0..20).map(|i| Vector2::new(i, 40)).collect(),
    };

    let iterations = 10_000;
    let start = Instant::now();

    for _ in 0..iterations {
        let serialized = serialize(&packet).unwrap();
        let _deserialized: Packet = deserialize(&serialized).unwrap();
    }

    let duration = start.elapsed();
    println!(
        "Packet serialization: {} iterations in {:?} ({:.2} μs/iter)",
        iterations,
        duration,
        duration.as_micros() as f64 / iterations as f64
    );

    // Should complete in under 5 seconds
    assert!(duration.as_secs() < 5);
}
