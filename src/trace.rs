//! Per-rule trace logging, kept on the `RuleCell` (not the `Rule`) so it
//! survives a `remove_rule` + `add_rule` round-trip under the same
//! symbol, per the open question in spec.md §9.

use crate::result::PResult;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TraceOutcome {
    Matched { end: usize },
    Failed,
    LeftRecursionMarker,
}

#[derive(Debug, Clone)]
pub struct TraceEvent {
    pub position: usize,
    pub outcome: TraceOutcome,
}

impl TraceEvent {
    pub fn from_result(position: usize, result: &PResult) -> Self {
        let outcome = match result {
            PResult::Ok { position: end, .. } => TraceOutcome::Matched { end: *end },
            PResult::Err(crate::result::ErrKind::LeftRecursionMarker { .. }) => {
                TraceOutcome::LeftRecursionMarker
            }
            PResult::Err(_) => TraceOutcome::Failed,
        };
        TraceEvent { position, outcome }
    }
}

/// Trace state for one rule cell. Disabled (`enabled = false`) by
/// default — enabling it costs an event push per `apply_rule` call, so it
/// is opt-in per rule.
#[derive(Debug, Clone, Default)]
pub struct TraceInfo {
    pub enabled: bool,
    pub events: Vec<TraceEvent>,
}

impl TraceInfo {
    pub fn record(&mut self, position: usize, result: &PResult) {
        if self.enabled {
            self.events.push(TraceEvent::from_result(position, result));
        }
    }

    pub fn clear(&mut self) {
        self.events.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::result::ErrKind;
    use crate::value::{Production, Value};
    use std::rc::Rc;

    #[test]
    fn disabled_trace_records_nothing() {
        let mut trace = TraceInfo::default();
        let ok = PResult::ok(2, Production::ready(Value::Empty));
        trace.record(0, &ok);
        assert!(trace.events.is_empty());
    }

    #[test]
    fn enabled_trace_records_outcome() {
        let mut trace = TraceInfo { enabled: true, events: Vec::new() };
        let ok = PResult::ok(2, Production::ready(Value::Empty));
        trace.record(0, &ok);
        let err = PResult::Err(ErrKind::InactiveRule { rule: Rc::from("x") });
        trace.record(1, &err);
        assert_eq!(trace.events.len(), 2);
        assert!(matches!(trace.events[0].outcome, TraceOutcome::Matched { end: 2 }));
        assert!(matches!(trace.events[1].outcome, TraceOutcome::Failed));
    }
}
