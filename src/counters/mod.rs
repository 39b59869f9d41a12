pub mod projector;
pub mod reconciler;

pub use projector::CounterProjector;
pub use reconciler::{ReconcileReport, Reconciler, spawn_reconciler};
