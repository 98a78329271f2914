//! Property-based tests over arbitrary sequences of operations. Each
//! property holds at every quiescent point, i.e. after every operation in
//! the sequence has been applied and committed.

use std::collections::BTreeMap;
use std::sync::Arc;

use proptest::prelude::*;

use fleet_core::clock::TestClock;
use fleet_core::model::{AgentState, GpuDescriptor, SessionRequirements, SessionState};
use fleet_core::ops::{AgentTemplate, Controller};

#[derive(Clone, Debug)]
enum Op {
    RegisterAgent { vram: u64, max_sessions: u32 },
    RequestSession { vram: u64 },
    TryAssignFirstMatch,
    HeartbeatClosesRandomSession,
    AdvanceClock { secs: i64 },
    RunReaper { mark_after: i64, remove_after: i64 },
}

fn op_strategy() -> impl Strategy<Value = Op> {
    prop_oneof![
        (1024u64..16384, 1u32..4).prop_map(|(vram, max_sessions)| Op::RegisterAgent { vram, max_sessions }),
        (512u64..8192).prop_map(|vram| Op::RequestSession { vram }),
        Just(Op::TryAssignFirstMatch),
        Just(Op::HeartbeatClosesRandomSession),
        (1i64..120).prop_map(|secs| Op::AdvanceClock { secs }),
        Just(Op::RunReaper { mark_after: 30, remove_after: 60 }),
    ]
}

fn requirements(vram: u64) -> SessionRequirements {
    SessionRequirements {
        version: "1.0.0".into(),
        gpu_requests: vec![vram],
        required_tags: BTreeMap::new(),
        tolerated_taints: BTreeMap::new(),
    }
}

/// Checks the fleet's capacity and mirror-consistency invariants against
/// the controller's current committed state. Panics (via `assert!`) on
/// violation, so proptest reports the shrunk failing sequence.
fn check_invariants(controller: &Controller, agent_ids: &[String]) {
    for agent_id in agent_ids {
        let Ok(agent) = controller.get_agent_by_id(agent_id) else { continue };

        // Non-negative capacity.
        assert!(agent.sessions_available >= 0, "negative sessions_available for {agent_id}");

        let total_vram: u64 = agent.gpus.iter().map(|g| g.total_vram_mb).sum();
        let mut placed_vram = 0u64;
        let mut placed_count = 0i64;

        for (session_id, mirrored_state) in &agent.sessions {
            let session = controller
                .get_session_by_id(session_id)
                .unwrap_or_else(|_| panic!("mirror consistency: {session_id} listed on {agent_id} but absent from session table"));
            assert_eq!(session.agent_id, *agent_id, "mirror consistency: {session_id} agent_id mismatch");
            assert_eq!(session.state, *mirrored_state, "mirror consistency: {session_id} state mismatch");
            assert_ne!(session.state, SessionState::Closed, "a Closed session must never remain in an agent's list");
            placed_vram += session.vram_required;
            placed_count += 1;
        }

        // Capacity accounting.
        assert_eq!(agent.vram_available, total_vram - placed_vram, "vram accounting drift on {agent_id}");
        assert_eq!(agent.sessions_available, agent.max_sessions as i64 - placed_count, "session slot accounting drift on {agent_id}");
        assert!(agent.vram_available <= total_vram, "vram_available exceeds total on {agent_id}");
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn invariants_hold_after_every_operation(ops in prop::collection::vec(op_strategy(), 1..40)) {
        let clock = Arc::new(TestClock::new(1_000_000));
        let controller = Controller::new(clock.clone());
        let mut agent_ids: Vec<String> = Vec::new();
        let mut session_ids: Vec<String> = Vec::new();

        for op in ops {
            match op {
                Op::RegisterAgent { vram, max_sessions } => {
                    let id = controller
                        .register_agent(AgentTemplate {
                            address: "10.0.0.1:9000".into(),
                            tags: BTreeMap::new(),
                            taints: BTreeMap::new(),
                            gpus: vec![GpuDescriptor { id: "gpu0".into(), total_vram_mb: vram }],
                            max_sessions,
                        })
                        .unwrap();
                    agent_ids.push(id);
                }
                Op::RequestSession { vram } => {
                    let id = controller.request_session(requirements(vram)).unwrap();
                    session_ids.push(id);
                }
                Op::TryAssignFirstMatch => {
                    for session_id in &session_ids {
                        let Ok(session) = controller.get_queued_session_by_id(session_id) else { continue };
                        let candidates = controller.get_available_agents_matching(
                            session.vram_required,
                            &BTreeMap::new(),
                            &BTreeMap::new(),
                        );
                        if let Some(agent) = candidates.first() {
                            let _ = controller.assign_session(
                                session_id,
                                &agent.id,
                                vec![fleet_core::model::GpuSelection {
                                    gpu_id: agent.gpus[0].id.clone(),
                                    vram_mb: session.vram_required,
                                }],
                            );
                        }
                    }
                }
                Op::HeartbeatClosesRandomSession => {
                    for agent_id in &agent_ids {
                        let Ok(agent) = controller.get_agent_by_id(agent_id) else { continue };
                        if let Some((session_id, _)) = agent.sessions.first() {
                            let _ = controller.update_agent(fleet_core::ops::AgentUpdate {
                                agent_id: agent_id.clone(),
                                agent_state: AgentState::Active,
                                sessions: vec![(session_id.clone(), SessionState::Closed)],
                            });
                        }
                    }
                }
                Op::AdvanceClock { secs } => clock.advance(secs),
                Op::RunReaper { mark_after, remove_after } => {
                    controller.mark_missing(mark_after).unwrap();
                    controller.remove_stale(remove_after).unwrap();
                }
            }

            check_invariants(&controller, &agent_ids);
        }
    }

    #[test]
    fn heartbeat_idempotence(vram in 1024u64..16384, max_sessions in 1u32..4, session_vram in 512u64..8192) {
        let clock = Arc::new(TestClock::new(0));
        let controller = Controller::new(clock);
        let agent_id = controller
            .register_agent(AgentTemplate {
                address: "10.0.0.1:9000".into(),
                tags: BTreeMap::new(),
                taints: BTreeMap::new(),
                gpus: vec![GpuDescriptor { id: "gpu0".into(), total_vram_mb: vram }],
                max_sessions,
            })
            .unwrap();
        let session_id = controller.request_session(requirements(session_vram.min(vram))).unwrap();

        let assigned = controller
            .assign_session(&session_id, &agent_id, vec![fleet_core::model::GpuSelection {
                gpu_id: "gpu0".into(),
                vram_mb: session_vram.min(vram),
            }])
            .is_ok();
        prop_assume!(assigned);

        let update = fleet_core::ops::AgentUpdate {
            agent_id: agent_id.clone(),
            agent_state: AgentState::Active,
            sessions: vec![(session_id.clone(), SessionState::Active)],
        };
        controller.update_agent(update.clone()).unwrap();
        let first = controller.get_agent_by_id(&agent_id).unwrap();
        controller.update_agent(update).unwrap();
        let second = controller.get_agent_by_id(&agent_id).unwrap();

        prop_assert_eq!(first.vram_available, second.vram_available);
        prop_assert_eq!(first.sessions_available, second.sessions_available);
        prop_assert_eq!(&first.sessions, &second.sessions);
    }

    #[test]
    fn reaper_never_regresses_missing_to_active_without_a_heartbeat(ticks in 1usize..20) {
        let clock = Arc::new(TestClock::new(0));
        let controller = Controller::new(clock.clone());
        let agent_id = controller
            .register_agent(AgentTemplate {
                address: "10.0.0.1:9000".into(),
                tags: BTreeMap::new(),
                taints: BTreeMap::new(),
                gpus: vec![GpuDescriptor { id: "gpu0".into(), total_vram_mb: 4096 }],
                max_sessions: 1,
            })
            .unwrap();

        clock.advance(31);
        controller.mark_missing(30).unwrap();
        prop_assert!(matches!(controller.get_agent_by_id(&agent_id).unwrap().state, AgentState::Missing));

        for _ in 0..ticks {
            clock.advance(1);
            controller.mark_missing(30).unwrap();
            // Must stay Missing until either a heartbeat arrives or RemoveStale deletes it.
            if let Ok(agent) = controller.get_agent_by_id(&agent_id) {
                prop_assert!(matches!(agent.state, AgentState::Missing));
            }
        }
    }
}
