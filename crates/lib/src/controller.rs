//! Startup sequence: check backend readiness once, lazily initialize when
//! needed, and re-check. Transitions are a pure function of (state, event);
//! the network effects live in [`run_startup`].
//!
//! Runs once per session and independently of chat submission — sending a
//! query never waits for the machine to reach `Ready`.

use crate::api::{PlanBackend, SystemStatus};

/// Startup machine states. `Checking::initialized` records whether an
/// initialize round already ran: the machine attempts at most one, then
/// settles on `Ready` or `Unavailable`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartupState {
    Unchecked,
    Checking { initialized: bool },
    Initializing,
    Ready,
    Unavailable,
}

#[derive(Debug, Clone)]
pub enum StartupEvent {
    Started,
    StatusReceived(SystemStatus),
    StatusFailed,
    InitializeFinished { accepted: bool },
}

/// Pure transition function for the startup machine. Stray events leave the
/// state unchanged.
pub fn step(state: StartupState, event: StartupEvent) -> StartupState {
    use StartupEvent::*;
    use StartupState::*;
    match (state, event) {
        (Unchecked, Started) => Checking { initialized: false },
        (Checking { .. }, StatusReceived(status)) if status.is_ready() => Ready,
        (Checking { initialized: false }, StatusReceived(_)) => Initializing,
        (Checking { initialized: true }, StatusReceived(_)) => Unavailable,
        (Checking { .. }, StatusFailed) => Unavailable,
        // Re-check regardless of whether the initialize call was accepted;
        // the status endpoint is the source of truth.
        (Initializing, InitializeFinished { .. }) => Checking { initialized: true },
        (state, _) => state,
    }
}

/// Drive the machine to a terminal state (`Ready` or `Unavailable`).
/// Backend errors are logged and folded into the machine as events; the
/// caller decides how to present the terminal state.
pub async fn run_startup<B: PlanBackend>(backend: &B) -> StartupState {
    let mut state = step(StartupState::Unchecked, StartupEvent::Started);
    loop {
        state = match state {
            StartupState::Checking { .. } => match backend.fetch_status().await {
                Ok(status) => {
                    log::debug!(
                        "backend status: embeddings={} chain={} data={}",
                        status.embeddings_model_loaded,
                        status.chain_loaded,
                        status.data_loaded
                    );
                    step(state, StartupEvent::StatusReceived(status))
                }
                Err(e) => {
                    log::warn!("status check failed: {}", e);
                    step(state, StartupEvent::StatusFailed)
                }
            },
            StartupState::Initializing => {
                let accepted = match backend.trigger_initialize().await {
                    Ok(accepted) => accepted,
                    Err(e) => {
                        log::warn!("initialize request failed: {}", e);
                        false
                    }
                };
                log::info!(
                    "initialize request {}",
                    if accepted { "accepted" } else { "not accepted" }
                );
                step(state, StartupEvent::InitializeFinished { accepted })
            }
            terminal => return terminal,
        };
    }
}
