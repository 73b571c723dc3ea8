pub mod activity;
pub mod reconciler;
pub mod worker;

pub use activity::ActivityDetector;
pub use reconciler::{ContractReconciler, GasPolicy};
pub use worker::{MonitoringService, WorkerSettings};
