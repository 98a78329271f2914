//! The placement driver: the one piece of this module that is not itself
//! a core operation, but a loop built out of them. Sits outside
//! [`Controller`] so callers can choose their own cadence — `fleet-cli`
//! drives it on a timer, tests drive it by hand.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use log::debug;

use super::controller::Controller;
use crate::model::{Agent, GpuSelection};

/// Tries to place every currently queued session once. Returns the number
/// of sessions successfully assigned.
///
/// For each queued session, in queue order: fetch the candidate agents,
/// try them in the order returned, and move on to the next session on the
/// first successful assignment. A candidate that turns out to have lost
/// its capacity in the meantime (`CapacityExhausted`) is skipped in favor
/// of the next candidate rather than failing the whole pass.
pub fn run_once(controller: &Controller) -> usize {
    let mut placed = 0;

    for session in controller.get_queued_sessions() {
        let candidates = controller.get_available_agents_matching(
            session.requirements.total_vram_mb(),
            &session.requirements.required_tags,
            &session.requirements.tolerated_taints,
        );

        for agent in candidates {
            let Some(selections) = select_gpus(&agent, &session.requirements.gpu_requests) else {
                continue;
            };
            match controller.assign_session(&session.id, &agent.id, selections) {
                Ok(()) => {
                    placed += 1;
                    break;
                }
                Err(crate::error::Error::CapacityExhausted { .. }) => continue,
                Err(e) => {
                    debug!("placement of session {} onto agent {} failed: {e}", session.id, agent.id);
                    break;
                }
            }
        }
    }

    placed
}

/// Calls `run_once` on a fixed interval until `shutdown` is set, checked
/// between ticks (never mid-tick — a tick already in flight always runs
/// to completion before the loop looks at `shutdown` again).
pub fn run_forever(controller: &Controller, tick: Duration, shutdown: &AtomicBool) {
    while !shutdown.load(Ordering::SeqCst) {
        run_once(controller);
        std::thread::sleep(tick);
    }
}

/// First-fit: each requested per-GPU amount is matched against the first
/// GPU whose total capacity can hold it. The model tracks VRAM
/// availability only in aggregate (`Agent::vram_available`), so this does
/// not account for other sessions' claims on the same specific GPU; the
/// aggregate check in `assign_session` is what actually prevents
/// overcommit.
fn select_gpus(agent: &Agent, gpu_requests: &[u64]) -> Option<Vec<GpuSelection>> {
    let mut selections = Vec::with_capacity(gpu_requests.len());
    for &requested in gpu_requests {
        let gpu = agent.gpus.iter().find(|g| g.total_vram_mb >= requested)?;
        selections.push(GpuSelection { gpu_id: gpu.id.clone(), vram_mb: requested });
    }
    Some(selections)
}
