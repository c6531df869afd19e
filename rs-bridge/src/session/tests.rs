use std::sync::Arc;

use bevy::math::IVec3;
use rs_sim::collision::BlockMapping;
use rs_sim::{BoundingBox, ChunkCache, CollisionRegistry, PLAYER_EYE_OFFSET, PLAYER_HEIGHT};
use rs_utils::{BlockUpdate, FromSessionMessage, MovementReport, ToSessionMessage};

use super::*;

const AIR: u32 = 0;
const STONE: u32 = 1;
const DEEP_SNOW: u32 = 2;
const TOP_SLAB: u32 = 3;

fn registry() -> Arc<CollisionRegistry> {
    let boxes = vec![
        Vec::new(),
        vec![BoundingBox::new(0.5, 0.5, 0.5, 1.0, 1.0, 1.0)],
        vec![BoundingBox::new(0.5, 0.75, 0.5, 1.0, 0.5, 1.0)],
    ];
    let mappings: Vec<Option<BlockMapping>> = [
        ("minecraft:air", 0),
        ("minecraft:stone", 1),
        ("minecraft:snow[layers=8]", 1),
        ("minecraft:oak_slab[type=top,waterlogged=false]", 2),
    ]
    .into_iter()
    .map(|(java_identifier, collision_index)| {
        Some(BlockMapping {
            java_identifier: java_identifier.to_string(),
            collision_index,
        })
    })
    .collect();
    Arc::new(CollisionRegistry::from_parts(boxes, &mappings).unwrap())
}

fn floor() -> ChunkCache {
    let mut world = ChunkCache::default();
    for x in -1..=2 {
        for z in -1..=1 {
            world.set_block(IVec3::new(x, 0, z), STONE);
        }
    }
    world
}

fn movement(tick: u64, x: f32, feet_y: f32, z: f32) -> ToSessionMessage {
    ToSessionMessage::Movement(MovementReport {
        tick,
        position: [x, feet_y + PLAYER_EYE_OFFSET, z],
        on_ground: true,
        ..Default::default()
    })
}

fn teleport(x: f64, y: f64, z: f64) -> ToSessionMessage {
    ToSessionMessage::Teleport {
        position: [x, y, z],
    }
}

fn falling(tick: u64, x: f32, feet_y: f32, z: f32) -> ToSessionMessage {
    ToSessionMessage::Movement(MovementReport {
        tick,
        position: [x, feet_y + PLAYER_EYE_OFFSET, z],
        ..Default::default()
    })
}

fn sneaking(tick: u64) -> ToSessionMessage {
    ToSessionMessage::Movement(MovementReport {
        tick,
        position: [0.5, 1.0 + PLAYER_EYE_OFFSET, 0.5],
        on_ground: true,
        sneaking: true,
        ..Default::default()
    })
}

fn forwarded(out: &[FromSessionMessage]) -> Option<([f64; 3], Option<bool>)> {
    out.iter().find_map(|msg| match msg {
        FromSessionMessage::Forward {
            position, on_ground, ..
        } => Some((*position, *on_ground)),
        _ => None,
    })
}

#[test]
fn forwards_grounded_movement() {
    let mut session = BridgeSession::new(registry(), floor(), PLAYER_HEIGHT);
    assert_eq!(session.handle(teleport(0.5, 1.0, 0.5)), Some(Vec::new()));

    let out = session.handle(movement(1, 0.5, 1.0, 0.5)).unwrap();
    let (position, on_ground) = forwarded(&out).unwrap();
    assert!((position[1] - 1.0).abs() < 1e-6, "{:?}", position);
    assert_eq!(on_ground, Some(true));

    let out = session.handle(movement(2, 0.75, 1.0, 0.5)).unwrap();
    let (position, _) = forwarded(&out).unwrap();
    assert!((position[0] - 0.75).abs() < 1e-9);
    assert!((session.collision().player_bounding_box().middle.x - 0.75).abs() < 1e-9);
}

#[test]
fn deep_snow_cancels_movement() {
    let mut world = floor();
    world.set_block(IVec3::new(1, 1, 0), DEEP_SNOW);
    let mut session = BridgeSession::new(registry(), world, PLAYER_HEIGHT);
    session.handle(teleport(0.5, 1.0, 0.5));

    let out = session.handle(movement(2, 0.9, 1.0, 0.5)).unwrap();
    assert_eq!(out.len(), 2, "{:?}", out);
    assert_eq!(out[0], FromSessionMessage::Cancelled { tick: 2 });
    // The client goes back to its last accepted eye position.
    let FromSessionMessage::Resync { tick: 2, position } = out[1] else {
        panic!("expected a resync, got {:?}", out[1]);
    };
    assert!((position[0] - 0.5).abs() < 1e-6);
    assert!((position[1] - (1.0 + PLAYER_EYE_OFFSET)).abs() < 1e-5, "{:?}", position);
    assert!((session.collision().player_bounding_box().middle.x - 0.5).abs() < 1e-9);
}

#[test]
fn block_updates_reach_the_world() {
    let mut session = BridgeSession::new(registry(), ChunkCache::default(), PLAYER_HEIGHT);
    session.handle(teleport(0.5, 1.05, 0.5));
    session.handle(ToSessionMessage::BlockUpdates {
        updates: vec![BlockUpdate {
            x: 0,
            y: 0,
            z: 0,
            block_state: STONE,
        }],
    });

    let out = session.handle(movement(1, 0.5, 0.95, 0.5)).unwrap();
    let (position, _) = forwarded(&out).unwrap();
    assert!((position[1] - 1.0).abs() < 1e-6, "{:?}", position);
}

#[test]
fn sneaking_shrinks_the_box() {
    let mut session = BridgeSession::new(registry(), floor(), PLAYER_HEIGHT);
    session.handle(teleport(0.5, 1.0, 0.5));
    session.handle(sneaking(1));
    assert_eq!(session.collision().player_bounding_box().size.y, 1.5);

    session.handle(movement(2, 0.5, 1.0, 0.5));
    assert_eq!(session.collision().player_bounding_box().size.y, PLAYER_HEIGHT);
}

#[test]
fn stays_crouched_while_under_a_slab() {
    let mut world = floor();
    world.set_block(IVec3::new(0, 2, 0), TOP_SLAB);
    let mut session = BridgeSession::new(registry(), world, PLAYER_HEIGHT);
    session.handle(teleport(0.5, 1.0, 0.5));
    session.handle(sneaking(1));

    // Sneak released, but standing up would put the head in the slab.
    for tick in 2..=4 {
        session.handle(movement(tick, 0.5, 1.0, 0.5));
        assert_eq!(session.collision().player_bounding_box().size.y, 1.5, "tick {}", tick);
    }

    session.handle(ToSessionMessage::BlockUpdates {
        updates: vec![BlockUpdate {
            x: 0,
            y: 2,
            z: 0,
            block_state: AIR,
        }],
    });
    session.handle(movement(5, 0.5, 1.0, 0.5));
    assert_eq!(session.collision().player_bounding_box().size.y, PLAYER_HEIGHT);
}

#[test]
fn honey_drops_movement() {
    let mut session = BridgeSession::new(registry(), floor(), PLAYER_HEIGHT);
    session.handle(teleport(0.5, 1.0, 0.5));
    session.handle(movement(1, 0.5, 1.0, 0.5));

    session.handle(ToSessionMessage::PlayerContact {
        honey: true,
        slime: false,
        collided: false,
        motion: [0.0; 3],
    });
    let out = session.handle(movement(2, 0.5, 1.0, 0.6)).unwrap();
    assert_eq!(out, vec![FromSessionMessage::Cancelled { tick: 2 }]);

    // Honey contact only lasts one tick.
    let out = session.handle(movement(3, 0.5, 1.0, 0.6)).unwrap();
    assert!(forwarded(&out).is_some());
}

#[test]
fn moving_block_catches_a_falling_player() {
    let mut session = BridgeSession::new(registry(), ChunkCache::default(), PLAYER_HEIGHT);
    session.handle(ToSessionMessage::PistonAdded { position: [0, -1, 0] });
    session.handle(ToSessionMessage::MovingBlock {
        start: [0, 0, 0],
        piston: [0, -1, 0],
        block_state: STONE,
        progress: [0.0; 3],
    });
    session.handle(teleport(0.5, 1.25, 0.5));
    session.handle(falling(1, 0.5, 1.25, 0.5));

    let out = session.handle(falling(2, 0.5, 0.75, 0.5)).unwrap();
    let (position, _) = forwarded(&out).unwrap();
    assert!((position[1] - 1.0).abs() < 1e-9, "{:?}", position);
    let corrected = out.iter().find_map(|msg| match msg {
        FromSessionMessage::CorrectPosition {
            tick: 2, position, ..
        } => Some(*position),
        _ => None,
    });
    let corrected = corrected.unwrap();
    assert!((corrected[1] - (1.0 + PLAYER_EYE_OFFSET)).abs() < 1e-5, "{:?}", corrected);

    // Retracting the piston takes its blocks with it.
    session.handle(ToSessionMessage::PistonRemoved { position: [0, -1, 0] });
    let out = session.handle(falling(3, 0.5, 0.5, 0.5)).unwrap();
    let (position, _) = forwarded(&out).unwrap();
    assert!((position[1] - 0.5).abs() < 1e-6, "{:?}", position);
}

#[test]
fn piston_push_is_clamped_and_reported() {
    let mut session = BridgeSession::new(registry(), floor(), PLAYER_HEIGHT);
    session.handle(teleport(0.5, 1.0, 0.5));
    session.handle(movement(1, 0.5, 1.0, 0.5));
    session.handle(ToSessionMessage::PistonAdded { position: [-1, 1, 0] });

    let out = session
        .handle(ToSessionMessage::PistonPush {
            displacement: [0.4, 0.0, 0.0],
        })
        .unwrap();
    assert!(matches!(
        out.as_slice(),
        [FromSessionMessage::CorrectPosition { tick: 1, position, on_ground: true }]
            if (position[0] - 0.9).abs() < 1e-6
                && (position[1] - (1.0 + PLAYER_EYE_OFFSET)).abs() < 1e-5
    ), "{:?}", out);

    session.handle(ToSessionMessage::PistonPush {
        displacement: [0.4, 0.0, 0.0],
    });
    assert!((session.collision().player_bounding_box().middle.x - 1.01).abs() < 1e-9);
}

#[test]
fn respawn_starts_from_an_empty_world() {
    let mut session = BridgeSession::new(registry(), floor(), PLAYER_HEIGHT);
    session.handle(teleport(0.5, 1.0, 0.5));
    session.handle(movement(1, 0.5, 1.0, 0.5));
    let out = session.handle(falling(2, 0.5, 0.5, 0.5)).unwrap();
    let (position, _) = forwarded(&out).unwrap();
    assert!((position[1] - 1.0).abs() < 1e-6, "{:?}", position);

    session.handle(ToSessionMessage::Respawn {
        position: [0.5, 1.0, 0.5],
    });
    session.handle(falling(3, 0.5, 1.0, 0.5));
    let out = session.handle(falling(4, 0.5, 0.5, 0.5)).unwrap();
    let (position, _) = forwarded(&out).unwrap();
    assert!((position[1] - 0.5).abs() < 1e-6, "{:?}", position);
}

#[test]
fn unloaded_chunks_stop_colliding() {
    let mut session = BridgeSession::new(registry(), floor(), PLAYER_HEIGHT);
    session.handle(teleport(0.5, 1.0, 0.5));
    session.handle(movement(1, 0.5, 1.0, 0.5));

    assert_eq!(
        session.handle(ToSessionMessage::UnloadChunk { x: 9, z: 9 }),
        Some(Vec::new())
    );
    session.handle(ToSessionMessage::UnloadChunk { x: 0, z: 0 });
    let out = session.handle(falling(2, 0.5, 0.5, 0.5)).unwrap();
    let (position, _) = forwarded(&out).unwrap();
    assert!((position[1] - 0.5).abs() < 1e-6, "{:?}", position);
}

#[test]
fn threaded_session_replays_and_closes() {
    let session = BridgeSession::new(registry(), floor(), PLAYER_HEIGHT);
    let (to_session, from_session, handle) = start_session(session);

    to_session.0.send(teleport(0.5, 1.0, 0.5)).unwrap();
    to_session.0.send(movement(1, 0.5, 1.0, 0.5)).unwrap();
    to_session.0.send(ToSessionMessage::Shutdown).unwrap();

    let received: Vec<FromSessionMessage> = from_session.0.iter().collect();
    handle.join().unwrap();

    assert!(forwarded(&received).is_some());
    assert_eq!(received.last(), Some(&FromSessionMessage::Closed));
}
