//! Background Jobs for the Arena API
//!
//! - `admission`: the admission queue and its single worker
//! - `watchdog`: one timeout task per kicked-off battle
//!
//! Both observe the process-wide shutdown signal:
//!
//! ```ignore
//! let (shutdown_tx, shutdown_rx) = watch::channel(false);
//! let queue = Arc::new(AdmissionQueue::new(config.worker_idle, shutdown_rx));
//! queue.start_worker(orchestrator);
//!
//! // On shutdown
//! let _ = shutdown_tx.send(true);
//! ```

pub mod admission;
pub mod watchdog;

pub use admission::AdmissionQueue;
pub use watchdog::arm_watchdog;
