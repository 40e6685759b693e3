use std::path::PathBuf;

use anyhow::Context;
use clap::{Args, Parser, Subcommand, ValueEnum};
use tidefall_common::{BlockType, CellCoord};
use tidefall_kernel::World;
use tidefall_render::{DebugTextRenderer, RenderMode, RenderView, Renderer};
use tidefall_tools::WorldInspector;
use tidefall_worldgen::{WorldConfig, build_world};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "tidefall-cli", about = "CLI tool for tidefall worlds")]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct WorldArgs {
    /// YAML world config; defaults are used for anything it omits
    #[arg(short, long)]
    config: Option<PathBuf>,
    /// Override the config's seed
    #[arg(short, long)]
    seed: Option<u64>,
}

impl WorldArgs {
    fn load(&self) -> anyhow::Result<WorldConfig> {
        let mut config = match &self.config {
            Some(path) => WorldConfig::load(path)
                .with_context(|| format!("loading {}", path.display()))?,
            None => WorldConfig::default(),
        };
        if let Some(seed) = self.seed {
            config.seed = seed;
        }
        Ok(config)
    }
}

#[derive(Clone, Copy, ValueEnum)]
enum Layer {
    Blocks,
    Light,
}

#[derive(Subcommand)]
enum Commands {
    /// Print version and the default configuration
    Info,
    /// Generate a world and print its map
    Generate {
        #[command(flatten)]
        world: WorldArgs,
        /// Which layer to draw
        #[arg(short, long, value_enum, default_value = "blocks")]
        layer: Layer,
    },
    /// Generate a world, dig a shaft into it, and simulate
    Run {
        #[command(flatten)]
        world: WorldArgs,
        /// Number of ticks to simulate
        #[arg(short, long, default_value = "240")]
        ticks: u64,
        /// Seconds per tick
        #[arg(long, default_value = "0.016")]
        dt: f32,
        /// Blocks to dig out of the island's centre column
        #[arg(long, default_value = "0")]
        dig: u32,
        /// Print the map after the run
        #[arg(long)]
        render: bool,
        /// Print the summary as JSON
        #[arg(long)]
        json: bool,
    },
    /// Run the scripted session twice and compare state hashes
    Replay {
        #[command(flatten)]
        world: WorldArgs,
        /// Number of ticks to simulate
        #[arg(short, long, default_value = "120")]
        ticks: u64,
    },
}

/// Result of [`dig_shaft`].
#[derive(Debug, Default, PartialEq, Eq)]
struct Shaft {
    destroyed: usize,
    brick_dropped: bool,
}

/// Break blocks from the surface down in the island's centre column, then
/// drop a brick over the hole.
fn dig_shaft(world: &mut World, depth: u32) -> Shaft {
    if depth == 0 {
        return Shaft::default();
    }
    let col = world.grid().cols() as i32 / 2;
    let rows = world.grid().rows() as i32;
    let mut destroyed = 0;
    for _ in 0..depth {
        let Some(top) = (0..rows)
            .map(|row| CellCoord::new(col, row))
            .find(|&c| world.get(c).is_ok_and(|b| b.is_structural()))
        else {
            break;
        };
        if world.damage_block(top, f32::MAX) {
            destroyed += 1;
        }
    }
    let brick = CellCoord::new(col, 0);
    let brick_dropped = world.place_block(brick, BlockType::Brick);
    if !brick_dropped {
        tracing::warn!(%brick, "brick could not be dropped over the shaft");
    }
    Shaft {
        destroyed,
        brick_dropped,
    }
}

fn simulate(world: &mut World, ticks: u64, dt: f32) {
    let _span = tracing::info_span!("simulate", ticks).entered();
    for _ in 0..ticks {
        world.update(dt);
    }
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(filter))
        .init();

    match cli.command {
        Commands::Info => {
            println!("tidefall-cli v{}", env!("CARGO_PKG_VERSION"));
            println!("default config:");
            print!("{}", WorldConfig::default().to_yaml_string()?);
        }
        Commands::Generate { world, layer } => {
            let config = world.load()?;
            let (world, report) = build_world(&config);
            let view = RenderView {
                mode: match layer {
                    Layer::Blocks => RenderMode::Blocks,
                    Layer::Light => RenderMode::Light,
                },
                ..RenderView::whole(&world)
            };
            print!("{}", DebugTextRenderer::new().render(&world, &view));
            println!(
                "setup: passes={} chunks={} ocean={} lights={}",
                report.settle_passes, report.chunks_settled, report.ocean_cells, report.lights_cast
            );
            for (kind, count) in WorldInspector::census(&world) {
                println!("  {kind:?}: {count}");
            }
        }
        Commands::Run {
            world,
            ticks,
            dt,
            dig,
            render,
            json,
        } => {
            let config = world.load()?;
            let (mut world, _) = build_world(&config);
            let shaft = dig_shaft(&mut world, dig);
            tracing::info!(
                destroyed = shaft.destroyed,
                brick_dropped = shaft.brick_dropped,
                "shaft dug"
            );
            simulate(&mut world, ticks, dt);

            if render {
                let view = RenderView {
                    show_animations: true,
                    ..RenderView::whole(&world)
                };
                print!("{}", DebugTextRenderer::new().render(&world, &view));
            }
            let summary = WorldInspector::summary(&world);
            if json {
                println!("{}", serde_json::to_string_pretty(&summary)?);
            } else {
                println!("{summary}");
            }
        }
        Commands::Replay { world, ticks } => {
            let config = world.load()?;
            println!("Deterministic replay: seed={}, ticks={ticks}", config.seed);

            // Run 1
            let (mut w1, _) = build_world(&config);
            dig_shaft(&mut w1, 6);
            simulate(&mut w1, ticks, 1.0 / 60.0);
            let events = w1.events().to_vec();

            // Replay the recorded inputs into a fresh world
            let (mut w2, _) = build_world(&config);
            w2.replay_inputs(&events);

            println!("Run 1:  tick={} hash={:#018x}", w1.tick(), w1.state_hash());
            println!("Replay: tick={} hash={:#018x}", w2.tick(), w2.state_hash());
            if w1.state_hash() != w2.state_hash() {
                anyhow::bail!("replay diverged from the recorded run");
            }
            println!("Match: OK");
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tidefall_kernel::{Grid, SimConfig};

    fn column_world(height: i32) -> World {
        let mut grid = Grid::new(5, 6);
        for row in 6 - height..6 {
            grid.set(CellCoord::new(2, row), BlockType::Stone, false).unwrap();
        }
        World::new(grid, SimConfig::default(), 3)
    }

    #[test]
    fn shaft_digs_from_the_top_and_drops_a_brick() {
        let mut w = column_world(4);
        let shaft = dig_shaft(&mut w, 2);
        assert_eq!(
            shaft,
            Shaft {
                destroyed: 2,
                brick_dropped: true
            }
        );
        assert!(w.get(CellCoord::new(2, 3)).unwrap().is_air());
        assert_eq!(w.get_type(CellCoord::new(2, 4)).unwrap(), BlockType::Stone);
        assert_eq!(w.get_type(CellCoord::new(2, 0)).unwrap(), BlockType::Brick);
    }

    #[test]
    fn zero_depth_leaves_the_world_alone() {
        let mut w = column_world(4);
        let before = w.state_hash();
        assert_eq!(dig_shaft(&mut w, 0), Shaft::default());
        assert_eq!(w.state_hash(), before);
    }
}
