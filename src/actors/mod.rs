//! Actor-based probing pipeline
//!
//! Each scheduler bucket runs as an independent async task communicating
//! via Tokio channels; monitor workers are short-lived tasks fanned out
//! per tick.
//!
//! ## Architecture Overview
//!
//! ```text
//!                     ┌─────────────────┐
//!                     │   Hub (main)    │
//!                     └────────┬────────┘
//!                              │ spawns
//!          ┌─────────┬─────────┼─────────┬─────────┐
//!          │         │         │         │         │
//!     ┌────▼───┐ ┌───▼────┐ ┌──▼─────┐ ┌─▼──────┐ ┌▼───────┐
//!     │ 1 min  │ │ 5 min  │ │ 10 min │ │ 30 min │ │ 60 min │   bucket
//!     │ ticker │ │ ticker │ │ ticker │ │ ticker │ │ ticker │   schedulers
//!     └────┬───┘ └───┬────┘ └──┬─────┘ └─┬──────┘ └┬───────┘
//!          │ due-set │         │         │         │
//!          └────┬────┴────┬────┴────┬────┴─────────┘
//!               │ fan-out (pages of 100, join per page)
//!       ┌───────▼──────┐   ┌──────────────┐
//!       │ MonitorWorker│──▶│  Agent Pool  │ round-robin + failover
//!       │ (per monitor)│   └──────┬───────┘
//!       └───────┬──────┘          │ next()/other()
//!               │          ┌──────▼───────┐
//!               │          │ Probe Client │──▶ external monitor agents
//!               │          └──────────────┘
//!        ┌──────▼───────────────────────┐
//!        │ UptimeStore                  │ events + alerts + monitor touch
//!        └──────────────────────────────┘
//! ```
//!
//! ## Communication Patterns
//!
//! 1. **Commands**: each bucket scheduler has an mpsc command channel
//!    (`TickNow`, `Shutdown`)
//! 2. **Request/Response**: oneshot channels carry tick summaries back
//! 3. **Data plane**: workers write straight to the store; ordering per
//!    monitor is guaranteed by the due-set predicate, not by channels

pub mod messages;
pub mod scheduler;
pub mod worker;
