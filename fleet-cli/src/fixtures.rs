//! Synthetic agents and sessions for the demo subcommands. `fleet-core`
//! keeps no state across process restarts, so every `fleet-cli` invocation
//! that wants something to act on seeds one of these small fleets first.

use std::collections::BTreeMap;

use fleet_core::model::GpuDescriptor;
use fleet_core::ops::{AgentTemplate, Controller};

/// Registers `count` agents, each with one GPU, round-robining VRAM sizes
/// so placement has a mix of candidates to choose from.
pub fn seed_agents(controller: &Controller, count: usize) -> Vec<String> {
    const VRAM_SIZES: [u64; 3] = [8192, 16384, 24576];
    (0..count)
        .map(|i| {
            controller
                .register_agent(AgentTemplate {
                    address: format!("10.0.0.{}:9000", i + 1),
                    tags: BTreeMap::new(),
                    taints: BTreeMap::new(),
                    gpus: vec![GpuDescriptor { id: format!("gpu{i}"), total_vram_mb: VRAM_SIZES[i % VRAM_SIZES.len()] }],
                    max_sessions: 2,
                })
                .expect("seeding a fresh controller never fails")
        })
        .collect()
}

/// Queues `count` sessions, each requesting 4096 MiB on a single GPU.
pub fn seed_sessions(controller: &Controller, count: usize) -> Vec<String> {
    (0..count)
        .map(|_| {
            let requirements = fleet_core::model::SessionRequirements {
                version: "1.0.0".into(),
                gpu_requests: vec![4096],
                required_tags: BTreeMap::new(),
                tolerated_taints: BTreeMap::new(),
            };
            controller.request_session(requirements).expect("seeding a fresh controller never fails")
        })
        .collect()
}
