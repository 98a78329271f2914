//! The liveness reaper: `fleet-cli` drives [`Reaper::tick`] on its own
//! timer (ambient scheduling; no algorithm lives here beyond what
//! [`crate::ops::Controller`] already implements).

use crate::error::Result;
use crate::ops::Controller;

/// The two durations the reaper is parameterized by.
#[derive(Clone, Copy, Debug)]
pub struct ReaperConfig {
    /// An `Active` agent silent this long becomes `Missing`.
    pub mark_missing_after_secs: i64,
    /// A `Missing` agent silent this long is removed.
    pub remove_stale_after_secs: i64,
}

impl Default for ReaperConfig {
    fn default() -> Self {
        Self { mark_missing_after_secs: 30, remove_stale_after_secs: 300 }
    }
}

/// Runs [`Controller::mark_missing`] then [`Controller::remove_stale`] on
/// each `tick`. Ordering matters: an agent must pass through `Missing`
/// before it can be removed, so marking always runs first.
pub struct Reaper<'a> {
    controller: &'a Controller,
    config: ReaperConfig,
}

impl<'a> Reaper<'a> {
    pub fn new(controller: &'a Controller, config: ReaperConfig) -> Self {
        Self { controller, config }
    }

    pub fn tick(&self) -> Result<()> {
        self.controller.mark_missing(self.config.mark_missing_after_secs)?;
        self.controller.remove_stale(self.config.remove_stale_after_secs)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;
    use std::sync::Arc;

    use super::*;
    use crate::clock::TestClock;
    use crate::model::{AgentState, GpuDescriptor};
    use crate::ops::AgentTemplate;

    #[test]
    fn tick_marks_then_removes_across_two_windows() {
        let clock = Arc::new(TestClock::new(0));
        let controller = Controller::new(clock.clone());
        let agent_id = controller
            .register_agent(AgentTemplate {
                address: "10.0.0.1:9000".into(),
                tags: BTreeMap::new(),
                taints: BTreeMap::new(),
                gpus: vec![GpuDescriptor { id: "gpu0".into(), total_vram_mb: 1024 }],
                max_sessions: 1,
            })
            .unwrap();

        let reaper =
            Reaper::new(&controller, ReaperConfig { mark_missing_after_secs: 30, remove_stale_after_secs: 60 });

        clock.advance(31);
        reaper.tick().unwrap();
        assert!(matches!(controller.get_agent_by_id(&agent_id).unwrap().state, AgentState::Missing));

        clock.advance(61);
        reaper.tick().unwrap();
        assert!(controller.get_agent_by_id(&agent_id).is_err());
    }

    #[test]
    fn a_live_agent_is_never_touched() {
        let clock = Arc::new(TestClock::new(0));
        let controller = Controller::new(clock.clone());
        let agent_id = controller
            .register_agent(AgentTemplate {
                address: "10.0.0.1:9000".into(),
                tags: BTreeMap::new(),
                taints: BTreeMap::new(),
                gpus: vec![GpuDescriptor { id: "gpu0".into(), total_vram_mb: 1024 }],
                max_sessions: 1,
            })
            .unwrap();

        let reaper = Reaper::new(&controller, ReaperConfig::default());
        clock.advance(5);
        reaper.tick().unwrap();
        assert!(matches!(controller.get_agent_by_id(&agent_id).unwrap().state, AgentState::Active));
    }
}
