use super::transport::UpdateBatch;

/// Ingests server update batches for system-wide propagation.
///
/// The edit pipeline calls [`add_updates`](StateManager::add_updates) at most
/// once per successful request, after it has applied the batch locally.
pub trait StateManager: Send + Sync {
    fn add_updates(&self, batch: UpdateBatch);
}
