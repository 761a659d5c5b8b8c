// Execution module

pub mod host;
pub mod reconciler;

pub use host::TestHostCommand;
pub use reconciler::EventReconciler;
