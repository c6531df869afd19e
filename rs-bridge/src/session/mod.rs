use std::sync::Arc;
use std::thread::{self, JoinHandle};

use bevy::math::{DVec3, IVec3, Vec3};
use crossbeam::channel::{Receiver, Sender, unbounded};
use rs_sim::{
    ChunkCache, ClientUpdate, CollisionContext, CollisionManager, CollisionRegistry,
    PLAYER_EYE_OFFSET, PistonCache, PlayerState, VerticalInput, YAxisSimulator,
    piston::MovingBlock,
};
use rs_utils::{
    FromSession, FromSessionMessage, MovementReport, ToSession, ToSessionMessage,
};
use tracing::{debug, info, trace, warn};

use crate::timing::{TickCost, Timing};

const SNEAKING_HEIGHT: f64 = 1.5;
const STANDING_EYE_HEIGHT: f64 = 1.62;
const SNEAKING_EYE_HEIGHT: f64 = 1.27;
const JUMP_VELOCITY: f32 = 0.42;

/// Movement state for one connected Bedrock player.
pub struct BridgeSession {
    registry: Arc<CollisionRegistry>,
    world: ChunkCache,
    pistons: PistonCache,
    collision: CollisionManager,
    vertical: YAxisSimulator,
    player: PlayerState,
    standing_height: f64,
    last_end_velocity_y: f32,
    last_feet_y: f32,
    last_tick: u64,
    awaiting_teleport: bool,
    cost: TickCost,
}

impl BridgeSession {
    pub fn new(registry: Arc<CollisionRegistry>, world: ChunkCache, player_height: f64) -> Self {
        let mut collision = CollisionManager::new();
        collision.update_player_bounding_box_height(player_height);
        Self {
            registry,
            world,
            pistons: PistonCache::default(),
            collision,
            vertical: YAxisSimulator::default(),
            player: PlayerState {
                bounding_box_height: player_height,
                ..Default::default()
            },
            standing_height: player_height,
            last_end_velocity_y: 0.0,
            last_feet_y: 0.0,
            last_tick: 0,
            awaiting_teleport: false,
            cost: TickCost::default(),
        }
    }

    #[cfg(test)]
    pub fn collision(&self) -> &CollisionManager {
        &self.collision
    }

    /// Handles one inbound message. `None` means the session is over.
    pub fn handle(&mut self, msg: ToSessionMessage) -> Option<Vec<FromSessionMessage>> {
        match msg {
            ToSessionMessage::Movement(report) => return Some(self.handle_movement(&report)),
            ToSessionMessage::ChunkData(chunk) => {
                trace!("Chunk {}, {} ({} sections)", chunk.x, chunk.z, chunk.sections.len());
                self.world.update_chunk(chunk);
            }
            ToSessionMessage::BlockUpdates { updates } => {
                self.world.apply_updates(&updates);
            }
            ToSessionMessage::Teleport { position } => {
                let position = DVec3::from_array(position);
                debug!("Teleporting player to {:?}", position);
                self.collision
                    .update_player_bounding_box(position, self.player.bounding_box_height);
                self.vertical.reset();
                self.awaiting_teleport = true;
            }
            ToSessionMessage::Respawn { position } => {
                let position = DVec3::from_array(position);
                info!("Respawning player at {:?}", position);
                self.world = ChunkCache::default();
                self.pistons.clear();
                self.player.bounding_box_height = self.standing_height;
                self.player.sneaking = false;
                self.collision
                    .update_player_bounding_box(position, self.standing_height);
                self.vertical.reset();
                self.awaiting_teleport = true;
            }
            ToSessionMessage::UnloadChunk { x, z } => {
                if self.world.has_chunk(x, z) {
                    self.world.unload_chunk(x, z);
                } else {
                    debug!("Unload for unknown chunk {}, {}", x, z);
                }
            }
            ToSessionMessage::PistonAdded { position } => {
                self.pistons.add_piston(IVec3::from_array(position));
            }
            ToSessionMessage::PistonRemoved { position } => {
                self.pistons.remove_piston(IVec3::from_array(position));
            }
            ToSessionMessage::MovingBlock {
                start,
                piston,
                block_state,
                progress,
            } => {
                let boxes = self
                    .registry
                    .collision(block_state)
                    .map(|collision| collision.boxes.clone())
                    .unwrap_or_default();
                trace!("Moving block {:?} ({} boxes)", start, boxes.len());
                self.pistons.add_moving_block(
                    IVec3::from_array(start),
                    MovingBlock {
                        piston: IVec3::from_array(piston),
                        boxes,
                        progress: DVec3::from_array(progress),
                    },
                );
            }
            ToSessionMessage::PistonPush { displacement } => {
                self.collision.displace_player(
                    &mut self.pistons,
                    DVec3::from_array(displacement),
                    self.player.on_ground,
                    &self.world,
                    self.registry.as_ref(),
                );
                let tick = self.last_tick;
                return Some(
                    self.collision
                        .take_client_updates()
                        .into_iter()
                        .map(|update| client_message(tick, update))
                        .collect(),
                );
            }
            ToSessionMessage::PlayerContact {
                honey,
                slime,
                collided,
                motion,
            } => {
                self.pistons.set_player_attached_to_honey(honey);
                self.pistons.set_player_slime_collision(slime);
                self.pistons.set_player_collided(collided);
                self.pistons.set_player_motion(Vec3::from_array(motion));
            }
            ToSessionMessage::Shutdown => {
                info!(
                    "Session closed after {} movement ticks (avg {:.3} ms, worst {:.3} ms)",
                    self.cost.ticks(),
                    self.cost.average_ms(),
                    self.cost.worst_ms()
                );
                return None;
            }
        }
        Some(Vec::new())
    }

    fn handle_movement(&mut self, report: &MovementReport) -> Vec<FromSessionMessage> {
        let timing = Timing::start();
        let tick = report.tick;

        let ctx = CollisionContext {
            world: &self.world,
            registry: self.registry.as_ref(),
            pistons: &self.pistons,
        };

        // Players stay crouched while a slab is above their head.
        let crouched = report.sneaking
            || self
                .collision
                .is_under_slab(self.player.bounding_box_height < self.standing_height, &ctx);
        let height = if crouched {
            SNEAKING_HEIGHT
        } else {
            self.standing_height
        };
        if height != self.player.bounding_box_height {
            self.collision.update_player_bounding_box_height(height);
            self.player.bounding_box_height = height;
        }
        self.player.sneaking = report.sneaking;
        self.player.in_vehicle = report.in_vehicle;

        let teleported = report.teleported || self.awaiting_teleport;
        let adjusted = self.collision.adjust_bedrock_position(
            report.position(),
            report.on_ground,
            teleported,
            &self.player,
            &ctx,
        );

        let eye_height = if crouched {
            SNEAKING_EYE_HEIGHT
        } else {
            STANDING_EYE_HEIGHT
        };
        let mut out = Vec::new();
        let feet_y = report.position[1] - PLAYER_EYE_OFFSET;
        match adjusted {
            Some(result) => {
                let vertical = self.vertical.simulate(&VerticalInput {
                    y_position: feet_y,
                    delta_y: report.delta[1],
                    handle_teleport: teleported,
                    gliding: report.gliding,
                    in_vehicle: report.in_vehicle,
                    touching_water: report.touching_water
                        || self.collision.is_player_in_water(&ctx)
                        || self.collision.is_water_in_eyes(eye_height, &ctx),
                    last_tick_end_velocity_y: self.last_end_velocity_y,
                    entity_y: self.last_feet_y,
                    jumped_on_ground: report.jumped_on_ground,
                    jump_velocity: JUMP_VELOCITY,
                    colliding_vertically: report.colliding_vertically,
                });
                out.push(FromSessionMessage::Forward {
                    tick,
                    position: result.position.to_array(),
                    on_ground: result.on_ground,
                    vertical: Some(vertical),
                });
                self.awaiting_teleport = false;
            }
            None => {
                debug!("Tick {}: movement cancelled", tick);
                out.push(FromSessionMessage::Cancelled { tick });
            }
        }

        for update in self.collision.take_client_updates() {
            out.push(client_message(tick, update));
        }

        self.player.on_ground = report.on_ground;
        self.last_end_velocity_y = report.delta[1];
        self.last_feet_y = feet_y;
        self.last_tick = tick;
        // Piston effects gathered since the last report applied to this one.
        self.pistons.tick();

        let ms = timing.ms();
        self.cost.record(ms);
        trace!("Tick {} handled in {:.3} ms", tick, ms);
        out
    }
}

fn client_message(tick: u64, update: ClientUpdate) -> FromSessionMessage {
    match update {
        ClientUpdate::CorrectPosition {
            position,
            on_ground,
        } => FromSessionMessage::CorrectPosition {
            tick,
            position: position.to_array(),
            on_ground,
        },
        ClientUpdate::Resync { position } => FromSessionMessage::Resync {
            tick,
            position: position.to_array(),
        },
        ClientUpdate::ScaffoldingFlags(flags) => FromSessionMessage::ScaffoldingFlags { tick, flags },
    }
}

/// Session loop. Ends on `Shutdown` or when either side hangs up.
pub fn run_session(
    mut session: BridgeSession,
    from_main: Receiver<ToSessionMessage>,
    to_main: Sender<FromSessionMessage>,
) {
    while let Ok(msg) = from_main.recv() {
        let Some(replies) = session.handle(msg) else {
            break;
        };
        for reply in replies {
            if to_main.send(reply).is_err() {
                warn!("Output closed, stopping session");
                return;
            }
        }
    }
    if to_main.send(FromSessionMessage::Closed).is_err() {
        debug!("Output closed before the session ended");
    }
}

/// Spawns a session on its own thread.
pub fn start_session(session: BridgeSession) -> (ToSession, FromSession, JoinHandle<()>) {
    let (to_session_tx, to_session_rx) = unbounded();
    let (from_session_tx, from_session_rx) = unbounded();
    let handle = thread::spawn(move || run_session(session, to_session_rx, from_session_tx));
    (ToSession(to_session_tx), FromSession(from_session_rx), handle)
}

#[cfg(test)]
mod tests;
