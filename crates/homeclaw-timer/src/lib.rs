//! # HomeClaw Timer
//!
//! One-shot action scheduler for smart-home entities.
//! Schedule "turn the fan off in 20 minutes" or "close the blinds at
//! 21:30", survive restarts, and get out of the way when the user beats
//! the timer to it.
//!
//! ## Design Principles
//! - One timer, one state listener per active task key — nothing polls
//! - JSON file persistence — tasks survive restarts, overdue ones replay
//! - Auto-cancel — a manual state change that makes the scheduled
//!   action redundant cancels it instead of fighting the user
//! - Best-effort notifications — delivery never blocks scheduling
//!
//! ## Architecture
//! ```text
//! run_action ──▶ TimerCoordinator
//!                  ├── TaskStore (versioned JSON, full-map writes)
//!                  ├── PreferenceStore (last-used params + history ≤ 3)
//!                  ├── tokio timer per key ──▶ ActionExecutor (hub REST)
//!                  ├── StateBus listener per key ──▶ auto-cancel
//!                  ├── EventBus (task_started / completed / cancelled)
//!                  ├── Notifier (in-app feed + mobile push)
//!                  └── StatusBoard (watch channel, read-only mirror)
//! ```

pub mod actions;
pub mod coordinator;
pub mod events;
pub mod executor;
pub mod notify;
pub mod prefs;
pub mod projection;
pub mod service;
pub mod state;
pub mod store;
pub mod tasks;

pub use actions::Action;
pub use coordinator::TimerCoordinator;
pub use events::{CancelReason, EventBus, TimerEvent};
pub use executor::{ActionExecutor, RestExecutor};
pub use notify::{ChannelNotifier, Notification, Notifier, NotifyRoute};
pub use prefs::{HistoryEntry, PreferenceRecord, PreferenceStore};
pub use projection::{PreferenceMap, StatusBoard, TaskMap};
pub use service::RunActionRequest;
pub use state::{StateBus, StateChange};
pub use store::TaskStore;
pub use tasks::{TaskRecord, TimeMode, TimeUnit};
