// Application Layer - Use Cases and Business Logic

pub mod constants;
pub mod lifecycle;
pub mod reconcile;

#[cfg(test)]
pub(crate) mod test_support;

// Re-exports
pub use lifecycle::{CreateJobRequest, JobLifecycleManager, LifecycleConfig};
pub use reconcile::{ReconcileScheduler, StaleJobReconciler};
