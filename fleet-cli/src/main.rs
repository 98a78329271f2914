use std::collections::BTreeMap;
use std::env;
use std::panic;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use clap::{Parser, Subcommand};
use log::info;

use fleet_cli::config::ConfigLoad;
use fleet_cli::{fixtures, trace};
use fleet_core::clock::SystemClock;
use fleet_core::model::{AgentState, GpuDescriptor, SessionRequirements, SessionState};
use fleet_core::ops::{self, AgentTemplate, AgentUpdate, Controller};
use fleet_core::reaper::{Reaper, ReaperConfig};

#[derive(Debug, Parser)]
#[command(version, author, about = "Demo control plane for a GPU-sharing fleet")]
struct Args {
    #[clap(short, long, help = "print parsed args and config before running")]
    debug: bool,

    #[clap(short = 'c', long = "config", help = "Configuration file path", default_value = "config/fleet-cli.yaml")]
    config: String,

    #[clap(short = 'l', long, help = "overrides the configured log level")]
    log_level: Option<String>,

    #[clap(subcommand)]
    cmd: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Register a single agent and print its initial state.
    RegisterAgent {
        #[arg(long, default_value = "10.0.0.1:9000")]
        address: String,
        #[arg(long, default_value_t = 8192)]
        vram_mb: u64,
        #[arg(long, default_value_t = 2)]
        max_sessions: u32,
        #[arg(long = "tag", value_parser = parse_key_val)]
        tags: Vec<(String, String)>,
        #[arg(long = "taint", value_parser = parse_key_val)]
        taints: Vec<(String, String)>,
    },
    /// Seed one agent, queue a session against it, and place it.
    RequestSession {
        #[arg(long, default_value_t = 4096)]
        vram_mb: u64,
    },
    /// Seed one agent and a session placed on it, then heartbeat it closed.
    Heartbeat,
    /// Seed a small fleet, run one placement pass, and print what's left available.
    Status {
        #[arg(long, default_value_t = 3)]
        agents: usize,
        #[arg(long, default_value_t = 5)]
        sessions: usize,
    },
    /// Run the placement driver and reaper on independent timers until interrupted.
    Run {
        #[arg(long, default_value_t = 3)]
        agents: usize,
        #[arg(long, default_value_t = 5)]
        sessions: usize,
    },
}

fn parse_key_val(s: &str) -> Result<(String, String), String> {
    let (k, v) = s.split_once('=').ok_or_else(|| format!("expected key=value, got `{s}`"))?;
    Ok((k.to_string(), v.to_string()))
}

#[tokio::main]
pub async fn main() -> Result<()> {
    setup_panic_hooks();

    eprintln!();
    eprintln!(" ___ _        _    ");
    eprintln!("| __| |___ ___| |_ ");
    eprintln!("| _|| / -_) -_)  _|");
    eprintln!("|_| |_\\___\\___|\\__|  Fleet Control Plane");
    eprintln!();

    let args = Args::parse();
    if args.debug {
        println!("{args:?}");
    }

    let mut cfg = match ConfigLoad::new(&args.config) {
        Ok(c) => c,
        Err(_) => ConfigLoad::default(),
    };
    if let Some(level) = &args.log_level {
        cfg.log_level = level.clone();
    }

    let _guards = trace::init_logging(&cfg.get_log_dir(), &cfg.log_level).await?;
    info!("fleet-cli starting, args: {:?}", &args);
    info!("fleet-cli config: {:?}", &cfg);

    let running = Arc::new(AtomicBool::new(true));
    let r = running.clone();
    ctrlc::set_handler(move || {
        println!("received Ctrl+C, shutting down");
        r.store(false, Ordering::SeqCst);
    })
    .expect("Error setting Ctrl-C handler");

    let controller = Controller::new(Arc::new(SystemClock));

    match args.cmd {
        Command::RegisterAgent { address, vram_mb, max_sessions, tags, taints } => {
            let id = controller.register_agent(AgentTemplate {
                address,
                tags: tags.into_iter().collect(),
                taints: taints.into_iter().collect(),
                gpus: vec![GpuDescriptor { id: "gpu0".into(), total_vram_mb: vram_mb }],
                max_sessions,
            })?;
            let agent = controller.get_agent_by_id(&id)?;
            println!("{agent:#?}");
        }
        Command::RequestSession { vram_mb } => {
            let _agent_ids = fixtures::seed_agents(&controller, 1);
            let session_id = controller.request_session(SessionRequirements {
                version: "1.0.0".into(),
                gpu_requests: vec![vram_mb],
                required_tags: BTreeMap::new(),
                tolerated_taints: BTreeMap::new(),
            })?;
            ops::run_once(&controller);
            let session = controller.get_session_by_id(&session_id)?;
            println!("{session:#?}");
        }
        Command::Heartbeat => {
            let agent_ids = fixtures::seed_agents(&controller, 1);
            let agent_id = agent_ids[0].clone();
            let session_id = controller.request_session(SessionRequirements {
                version: "1.0.0".into(),
                gpu_requests: vec![4096],
                required_tags: BTreeMap::new(),
                tolerated_taints: BTreeMap::new(),
            })?;
            ops::run_once(&controller);
            controller.update_agent(AgentUpdate {
                agent_id: agent_id.clone(),
                agent_state: AgentState::Active,
                sessions: vec![(session_id, SessionState::Closed)],
            })?;
            let agent = controller.get_agent_by_id(&agent_id)?;
            println!("{agent:#?}");
        }
        Command::Status { agents, sessions } => {
            fixtures::seed_agents(&controller, agents);
            fixtures::seed_sessions(&controller, sessions);
            let placed = ops::run_once(&controller);
            println!("placed {placed} session(s) this pass");
            for agent in controller.get_available_agents_matching(0, &BTreeMap::new(), &BTreeMap::new()) {
                println!("{agent:#?}");
            }
        }
        Command::Run { agents, sessions } => {
            fixtures::seed_agents(&controller, agents);
            fixtures::seed_sessions(&controller, sessions);

            let reaper_config = ReaperConfig {
                mark_missing_after_secs: cfg.mark_missing_after_secs,
                remove_stale_after_secs: cfg.remove_stale_after_secs,
            };
            let reaper = Reaper::new(&controller, reaper_config);

            let mut placement_tick = tokio::time::interval(Duration::from_secs(cfg.placement_tick_secs));
            let mut reaper_tick = tokio::time::interval(Duration::from_secs(cfg.reaper_tick_secs));

            while running.load(Ordering::SeqCst) {
                tokio::select! {
                    _ = placement_tick.tick() => {
                        let placed = ops::run_once(&controller);
                        if placed > 0 {
                            info!("placed {placed} session(s)");
                        }
                    }
                    _ = reaper_tick.tick() => {
                        reaper.tick()?;
                    }
                }
            }
        }
    }

    controller.close();
    Ok(())
}

fn setup_panic_hooks() {
    let meta = human_panic::Metadata {
        version: env!("CARGO_PKG_VERSION").into(),
        name: env!("CARGO_PKG_NAME").into(),
        authors: env!("CARGO_PKG_AUTHORS").replace(':', ", ").into(),
        homepage: env!("CARGO_PKG_HOMEPAGE").into(),
    };

    let default_hook = panic::take_hook();
    if env::var("RUST_BACKTRACE").is_err() {
        panic::set_hook(Box::new(move |info: &panic::PanicInfo| {
            default_hook(info);
            let file_path = human_panic::handle_dump(&meta, info);
            human_panic::print_msg(file_path, &meta).expect("human-panic: printing error message to console failed");
        }));
    }
}
