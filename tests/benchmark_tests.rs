//! Performance benchmarks for critical game systems

use shared::{Broadcast, Color, ParticipantId, UnitId, UnitTransform, Vec3};
use std::collections::HashMap;
use std::time::Instant;

use rand::rngs::StdRng;
use rand::SeedableRng;
use server::unit::{ClosestEnemy, TargetPolicy, Unit};

use client::lobby::{LobbyCoordinator, MembershipEvent};
use shared::LobbyMember;

fn unit_grid(count: u32) -> HashMap<UnitId, Unit> {
    (0..count)
        .map(|i| {
            let unit = Unit::new(
                UnitId(i + 1),
                ParticipantId(1 + i % 4),
                (1 + i % 4) as u8,
                Vec3::new((i % 10) as f32 * 2.0, 0.0, (i / 10) as f32 * 2.0),
            );
            (unit.id, unit)
        })
        .collect()
}

/// Benchmarks fixed-step movement across a large unit population
#[test]
fn benchmark_movement_updates() {
    let mut units = unit_grid(100);
    let mut events = Vec::new();
    for unit in units.values_mut() {
        unit.initialize(Vec3::new(50.0, 0.0, 50.0), &mut events);
    }

    let mut rng = StdRng::seed_from_u64(1);
    let dt = 1.0 / 60.0;
    let iterations = 1000;
    let ids: Vec<UnitId> = units.keys().copied().collect();

    let start = Instant::now();
    for _ in 0..iterations {
        for id in &ids {
            let mut unit = units.remove(id).unwrap();
            unit.fixed_update(dt, &mut units, &mut rng, &mut events);
            units.insert(*id, unit);
        }
        events.clear();
    }
    let duration = start.elapsed();

    println!(
        "Movement: {} unit-ticks in {:?} ({:.2} ns/unit-tick)",
        iterations * units.len(),
        duration,
        duration.as_nanos() as f64 / (iterations * units.len()) as f64
    );

    // 100k unit-steps should finish well under a second
    assert!(duration.as_millis() < 1000);
}

/// Benchmarks target acquisition over a crowded field
#[test]
fn benchmark_target_acquisition() {
    let units = unit_grid(100);
    let policy = ClosestEnemy::default();
    let candidates: Vec<&Unit> = units.values().collect();
    let seeker = units.values().next().unwrap();

    let iterations = 10_000;
    let start = Instant::now();
    for _ in 0..iterations {
        let _ = policy.acquire(seeker, &candidates);
    }
    let duration = start.elapsed();

    println!(
        "Target acquisition: {} iterations in {:?} ({:.2} μs/iter)",
        iterations,
        duration,
        duration.as_micros() as f64 / iterations as f64
    );

    assert!(duration.as_millis() < 1000);
}

/// Benchmarks world snapshot serialization at session scale
#[test]
fn benchmark_snapshot_serialization() {
    let snapshot = Broadcast::WorldSnapshot {
        tick: 12345,
        units: (0..100)
            .map(|i| UnitTransform {
                unit_id: UnitId(i),
                position: Vec3::new(i as f32, 0.0, -(i as f32)),
                yaw: 0.5,
            })
            .collect(),
    };

    let iterations = 10_000;
    let start = Instant::now();
    let mut bytes = 0usize;
    for _ in 0..iterations {
        let data = bincode::serialize(&snapshot).unwrap();
        bytes = data.len();
        let _: Broadcast = bincode::deserialize(&data).unwrap();
    }
    let duration = start.elapsed();

    println!(
        "Snapshot roundtrip: {} iterations of {} bytes in {:?} ({:.2} μs/iter)",
        iterations,
        bytes,
        duration,
        duration.as_micros() as f64 / iterations as f64
    );

    // A 100-unit snapshot must stay well inside a UDP datagram
    assert!(bytes < 8192);
    assert!(duration.as_millis() < 2000);
}

/// Benchmarks lobby snapshot reconciliation under event load
#[test]
fn benchmark_lobby_reconciliation() {
    let mut coordinator = LobbyCoordinator::new(ParticipantId(1));
    for i in 0..8 {
        coordinator.reconcile(MembershipEvent::MemberJoined {
            member: LobbyMember {
                participant_id: ParticipantId(i + 1),
                display_name: format!("player-{}", i + 1),
                is_ready: false,
                is_host: i == 0,
            },
        });
    }

    let iterations = 10_000;
    let start = Instant::now();
    for i in 0..iterations {
        coordinator.reconcile(MembershipEvent::MemberDataChanged {
            index: (i % 8) as u32,
            member: LobbyMember {
                participant_id: ParticipantId((i % 8) as u32 + 1),
                display_name: format!("player-{}", (i % 8) + 1),
                is_ready: i % 2 == 0,
                is_host: i % 8 == 0,
            },
        });
    }
    let duration = start.elapsed();

    println!(
        "Lobby reconciliation: {} patches in {:?} ({:.2} μs/patch)",
        iterations,
        duration,
        duration.as_micros() as f64 / iterations as f64
    );

    assert!(duration.as_millis() < 1000);
}

/// Benchmarks combat resolution pressure: many attackers on one target
#[test]
fn benchmark_combat_resolution() {
    let mut units = unit_grid(20);
    let mut events = Vec::new();
    let target_id = UnitId(1);

    let ids: Vec<UnitId> = units.keys().copied().filter(|id| *id != target_id).collect();
    for id in &ids {
        if let Some(unit) = units.get_mut(id) {
            if unit.team_id != 1 {
                unit.begin_attack(target_id, true, &mut events);
            }
        }
    }

    let mut rng = StdRng::seed_from_u64(2);
    let dt = 1.0 / 60.0;
    let iterations = 5_000;

    let start = Instant::now();
    for _ in 0..iterations {
        for id in &ids {
            let Some(mut unit) = units.remove(id) else {
                continue;
            };
            unit.fixed_update(dt, &mut units, &mut rng, &mut events);
            units.insert(*id, unit);
        }
        events.clear();
    }
    let duration = start.elapsed();

    println!(
        "Combat: {} attacker-ticks in {:?} ({:.2} ns/tick)",
        iterations * ids.len(),
        duration,
        duration.as_nanos() as f64 / (iterations * ids.len()) as f64
    );

    assert!(duration.as_millis() < 2000);
}

/// Benchmarks spawn-broadcast encoding at full-session scale
#[test]
fn benchmark_broadcast_fanout_encoding() {
    let broadcasts: Vec<Broadcast> = (0..100)
        .map(|i| Broadcast::UnitSpawned {
            unit_id: UnitId(i),
            owner: ParticipantId(i % 8 + 1),
            position: Vec3::new(i as f32, 0.0, 0.0),
            color: Color((i % 255) as u8, 128, 64),
            team_id: (i % 8 + 1) as u8,
        })
        .collect();

    let iterations = 1_000;
    let start = Instant::now();
    for _ in 0..iterations {
        for broadcast in &broadcasts {
            let _ = bincode::serialize(broadcast).unwrap();
        }
    }
    let duration = start.elapsed();

    println!(
        "Spawn broadcast encoding: {} messages in {:?} ({:.2} ns/msg)",
        iterations * broadcasts.len(),
        duration,
        duration.as_nanos() as f64 / (iterations * broadcasts.len()) as f64
    );

    assert!(duration.as_millis() < 2000);
}
