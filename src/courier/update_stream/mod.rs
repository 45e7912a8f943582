//! Update Streaming Module
//!
//! Fans server update batches out to per-peer subscribers. This is the
//! bundled [`StateManager`](crate::courier::state_manager::StateManager)
//! implementation.

mod manager;
mod types;

pub use manager::UpdateStreamManager;
pub use types::{PeerUpdate, UpdateTrigger};
