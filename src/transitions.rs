//! State-change detection
//!
//! A fresh probe result only becomes a new uptime event when the
//! authoritative field for the monitor's kind differs from the last
//! recorded event. With no prior event the comparison basis is the
//! sentinel "unknown", so the first observation always appends. The same
//! applies when the prior event was recorded under a different kind:
//! after a kind change the first probe is always a fresh transition.
//!
//! These functions are pure; the worker owns the surrounding I/O and the
//! ordering rule (close the previous event first, write the new one
//! last).

use crate::probe::ProbeOutcome;
use crate::storage::EventRow;
use crate::MonitorKind;

/// Whether the kind-authoritative field of a fresh result is adverse.
pub fn is_adverse(kind: MonitorKind, outcome: &ProbeOutcome) -> bool {
    match kind {
        MonitorKind::Web => outcome.availability.is_adverse(),
        MonitorKind::Ping => outcome.ping.is_adverse(),
        MonitorKind::Port => outcome.port_state.is_adverse(),
    }
}

/// Decide whether `fresh` represents a state transition against the last
/// recorded event of this monitor.
pub fn should_append(kind: MonitorKind, fresh: &ProbeOutcome, last: Option<&EventRow>) -> bool {
    let Some(last) = last else {
        // No prior event: last authoritative state is unknown.
        return true;
    };

    if last.kind != kind {
        // The prior event's authoritative field belongs to another kind.
        return true;
    }

    match kind {
        MonitorKind::Web => fresh.availability != last.availability,
        MonitorKind::Ping => fresh.ping != last.ping,
        MonitorKind::Port => fresh.port_state != last.port_state,
    }
}
