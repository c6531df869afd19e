use std::fs::File;
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread;

use clap::Parser;
use rs_sim::{ChunkCache, CollisionRegistry, PLAYER_HEIGHT};
use rs_utils::{BlockUpdate, ChunkData, FromSessionMessage, ToSessionMessage, bridge_data_root};
use serde::Deserialize;
use tracing::{Level, debug, error, info, warn};

mod session;
mod timing;

use session::{BridgeSession, start_session};

/// Replays a Bedrock movement trace through the collision engine and prints
/// what would be sent to the Java server and back to the client.
#[derive(Parser, Debug)]
#[command(name = "rs-bridge", version)]
struct Args {
    /// JSON-lines movement trace
    trace: PathBuf,

    /// Collision box table (defaults to `collision.json` in the data directory)
    #[arg(long)]
    collision: Option<PathBuf>,

    /// Java block state mappings (defaults to `blocks.json` in the data directory)
    #[arg(long)]
    blocks: Option<PathBuf>,

    /// Chunks and block updates loaded before the trace starts
    #[arg(long)]
    world: Option<PathBuf>,

    #[arg(long, default_value_t = Level::INFO)]
    log_level: Level,

    #[arg(long, default_value_t = PLAYER_HEIGHT)]
    player_height: f64,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct WorldFixture {
    chunks: Vec<ChunkData>,
    blocks: Vec<BlockUpdate>,
}

fn load_world(path: &Path) -> Result<ChunkCache, Box<dyn std::error::Error>> {
    let fixture: WorldFixture = serde_json::from_reader(BufReader::new(File::open(path)?))?;
    let mut world = ChunkCache::default();
    let chunk_count = fixture.chunks.len();
    for chunk in fixture.chunks {
        world.update_chunk(chunk);
    }
    world.apply_updates(&fixture.blocks);
    info!(
        "Loaded {} chunks and {} block updates from {}",
        chunk_count,
        fixture.blocks.len(),
        path.display()
    );
    Ok(world)
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_max_level(args.log_level)
        .with_writer(std::io::stderr)
        .without_time()
        .compact()
        .init();

    let data = bridge_data_root();
    let collision_path = args.collision.unwrap_or_else(|| data.join("collision.json"));
    let blocks_path = args.blocks.unwrap_or_else(|| data.join("blocks.json"));
    let registry = Arc::new(CollisionRegistry::load(&collision_path, &blocks_path)?);
    info!(
        "Collision table ready: {} states, {} shapes",
        registry.state_count(),
        registry.shape_count()
    );

    let world = match &args.world {
        Some(path) => load_world(path)?,
        None => ChunkCache::default(),
    };

    let trace = BufReader::new(File::open(&args.trace)?);
    let session = BridgeSession::new(registry, world, args.player_height);
    let (to_session, from_session, handle) = start_session(session);

    let reader = thread::spawn(move || {
        for (line_number, line) in trace.lines().enumerate() {
            let line = match line {
                Ok(line) => line,
                Err(e) => {
                    error!("Failed to read trace: {}", e);
                    break;
                }
            };
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<ToSessionMessage>(&line) {
                Ok(msg) => {
                    if to_session.0.send(msg).is_err() {
                        // Session thread hung up
                        return;
                    }
                }
                Err(e) => warn!("Skipping trace line {}: {}", line_number + 1, e),
            }
        }
        if to_session.0.send(ToSessionMessage::Shutdown).is_err() {
            debug!("Session ended before the trace did");
        }
    });

    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    for msg in from_session.0.iter() {
        writeln!(out, "{}", serde_json::to_string(&msg)?)?;
        if msg == FromSessionMessage::Closed {
            break;
        }
    }

    if reader.join().is_err() {
        error!("Trace reader panicked");
    }
    if handle.join().is_err() {
        error!("Session thread panicked");
    }
    Ok(())
}
