//! Thin demonstration surface for `agentcore`: wires a provider (real or mock), a
//! file-backed `HostFacade`, and the `AgentLoop` together so the core can be
//! smoke-tested from a terminal. Not part of the core's public contract.

pub mod host_facade;
pub mod log_format;
pub mod logging;
