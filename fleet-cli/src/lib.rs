//! `fleet-cli` drives [`fleet_core`] end to end: register agents, queue and
//! place sessions, heartbeat, and run the placement/reaper loop.

pub mod config;
pub mod fixtures;
pub mod trace;
