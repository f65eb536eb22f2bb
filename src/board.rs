// 📸 Board State Tracker - current vs immediately-previous resolution
//
// Snapshot rotation: before a new `current` is computed, the old one moves
// into `previous`. Change highlighting compares the two. Nothing older than
// `previous` is ever kept.
//
// Single-flight: a recompute that arrives while another one is running is
// dropped, never queued.

use chrono::{DateTime, Utc};
use std::collections::BTreeSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard};
use tracing::debug;

use crate::overrides::{OverrideSet, OverrideTarget};
use crate::reference::ReferenceData;
use crate::resolver::{resolve_all, ResolvedRates};

/// Minimum movement that counts as a change
pub const CHANGE_EPSILON: f64 = 0.0001;

// ============================================================================
// SNAPSHOT
// ============================================================================

#[derive(Debug, Clone, Default, PartialEq)]
pub struct BoardSnapshot {
    pub current: ResolvedRates,
    pub previous: ResolvedRates,

    /// When `current` was computed (None before the first pass)
    pub resolved_at: Option<DateTime<Utc>>,

    /// Completed resolution passes
    pub passes: u64,
}

impl BoardSnapshot {
    pub fn is_changed(&self, target: &OverrideTarget) -> bool {
        match (self.previous.get(target), self.current.get(target)) {
            (Some(previous), Some(current)) => (current - previous).abs() > CHANGE_EPSILON,
            _ => false,
        }
    }

    pub fn changes(&self) -> ChangeFlags {
        ChangeFlags(
            self.current
                .iter()
                .map(|(target, _)| target)
                .filter(|target| self.is_changed(target))
                .collect(),
        )
    }
}

/// Cells that moved in the last pass
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChangeFlags(BTreeSet<OverrideTarget>);

impl ChangeFlags {
    pub fn is_changed(&self, target: &OverrideTarget) -> bool {
        self.0.contains(target)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &OverrideTarget> {
        self.0.iter()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecomputeOutcome {
    Completed(ChangeFlags),
    /// Another recompute was in flight
    Dropped,
}

// ============================================================================
// TRACKER
// ============================================================================

#[derive(Debug, Default)]
pub struct BoardTracker {
    busy: AtomicBool,
    snapshot: Mutex<BoardSnapshot>,
}

/// Holds the busy flag; released on drop
pub struct RecomputeGuard<'a> {
    busy: &'a AtomicBool,
}

impl Drop for RecomputeGuard<'_> {
    fn drop(&mut self) {
        self.busy.store(false, Ordering::Release);
    }
}

impl BoardTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim the busy flag, or None if a recompute is already running
    pub fn try_begin(&self) -> Option<RecomputeGuard<'_>> {
        self.busy
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| RecomputeGuard { busy: &self.busy })
    }

    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::Acquire)
    }

    /// Rotate current → previous and resolve a fresh current
    pub fn recompute(&self, reference: &ReferenceData, overrides: &OverrideSet) -> RecomputeOutcome {
        let Some(_guard) = self.try_begin() else {
            debug!("recompute already in flight, dropping request");
            return RecomputeOutcome::Dropped;
        };

        let next = resolve_all(reference, overrides);

        let mut snapshot = self.lock();
        snapshot.previous = std::mem::replace(&mut snapshot.current, next);
        snapshot.resolved_at = Some(Utc::now());
        snapshot.passes += 1;

        let changes = snapshot.changes();
        debug!(pass = snapshot.passes, changed = changes.len(), "board recomputed");
        RecomputeOutcome::Completed(changes)
    }

    pub fn is_changed(&self, target: &OverrideTarget) -> bool {
        self.lock().is_changed(target)
    }

    pub fn changes(&self) -> ChangeFlags {
        self.lock().changes()
    }

    pub fn current(&self) -> ResolvedRates {
        self.lock().current.clone()
    }

    pub fn snapshot(&self) -> BoardSnapshot {
        self.lock().clone()
    }

    fn lock(&self) -> MutexGuard<'_, BoardSnapshot> {
        // A panic mid-rotation leaves a whole snapshot behind, still readable
        self.snapshot
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_first_recompute_flags_nothing() {
        let reference = ReferenceData::zambian_kwacha();
        let tracker = BoardTracker::new();

        let outcome = tracker.recompute(&reference, &OverrideSet::new());

        assert_eq!(outcome, RecomputeOutcome::Completed(ChangeFlags::default()));
        assert!(!tracker.is_changed(&OverrideTarget::buy("USD")));
        assert!(tracker.snapshot().previous.is_empty());
        assert_eq!(tracker.snapshot().passes, 1);
    }

    #[test]
    fn test_override_marks_cell_changed() {
        let reference = ReferenceData::zambian_kwacha();
        let tracker = BoardTracker::new();
        let mut overrides = OverrideSet::new();
        tracker.recompute(&reference, &overrides);

        overrides.set(&OverrideTarget::buy("USD"), 23.00);
        let outcome = tracker.recompute(&reference, &overrides);

        let RecomputeOutcome::Completed(changes) = outcome else {
            panic!("recompute should not be dropped");
        };
        assert_eq!(changes.len(), 1);
        assert!(changes.is_changed(&OverrideTarget::buy("USD")));
        assert!(tracker.is_changed(&OverrideTarget::buy("USD")));
        assert!(!tracker.is_changed(&OverrideTarget::sell("USD")));
    }

    #[test]
    fn test_unchanged_second_pass_clears_flags() {
        let reference = ReferenceData::zambian_kwacha();
        let tracker = BoardTracker::new();
        let mut overrides = OverrideSet::new();
        tracker.recompute(&reference, &overrides);
        overrides.set(&OverrideTarget::buy("USD"), 23.00);
        tracker.recompute(&reference, &overrides);

        tracker.recompute(&reference, &overrides);

        assert!(tracker.changes().is_empty());
    }

    #[test]
    fn test_tiny_movement_is_not_a_change() {
        let reference = ReferenceData::zambian_kwacha();
        let tracker = BoardTracker::new();
        let mut overrides = OverrideSet::new();
        overrides.set(&OverrideTarget::interest("30 Days Fixed"), 4.55);
        tracker.recompute(&reference, &overrides);

        overrides.set(&OverrideTarget::interest("30 Days Fixed"), 4.55005);
        tracker.recompute(&reference, &overrides);
        assert!(!tracker.is_changed(&OverrideTarget::interest("30 Days Fixed")));

        overrides.set(&OverrideTarget::interest("30 Days Fixed"), 4.56);
        tracker.recompute(&reference, &overrides);
        assert!(tracker.is_changed(&OverrideTarget::interest("30 Days Fixed")));
    }

    #[test]
    fn test_zero_previous_still_counts() {
        let reference = ReferenceData::zambian_kwacha();
        let tracker = BoardTracker::new();
        let mut overrides = OverrideSet::new();
        overrides.set(&OverrideTarget::sell("KES"), 0.0);
        tracker.recompute(&reference, &overrides);

        overrides.clear(&OverrideTarget::sell("KES"));
        tracker.recompute(&reference, &overrides);

        assert!(tracker.is_changed(&OverrideTarget::sell("KES")));
    }

    #[test]
    fn test_recompute_dropped_while_busy() {
        let reference = ReferenceData::zambian_kwacha();
        let tracker = BoardTracker::new();

        {
            let _guard = tracker.try_begin().unwrap();
            assert!(tracker.is_busy());
            assert_eq!(
                tracker.recompute(&reference, &OverrideSet::new()),
                RecomputeOutcome::Dropped
            );
            // Dropped request left the snapshot untouched
            assert_eq!(tracker.snapshot().passes, 0);
        }

        assert!(!tracker.is_busy());
        assert!(matches!(
            tracker.recompute(&reference, &OverrideSet::new()),
            RecomputeOutcome::Completed(_)
        ));
    }

    #[test]
    fn test_shared_tracker_across_threads() {
        let reference = Arc::new(ReferenceData::zambian_kwacha());
        let tracker = Arc::new(BoardTracker::new());

        let handles: Vec<_> = (0..4)
            .map(|_| {
                let reference = Arc::clone(&reference);
                let tracker = Arc::clone(&tracker);
                std::thread::spawn(move || tracker.recompute(&reference, &OverrideSet::new()))
            })
            .collect();

        let completed = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(|o| matches!(o, RecomputeOutcome::Completed(_)))
            .count() as u64;

        // Every completed pass rotated exactly once; dropped ones left no trace
        assert!(completed >= 1);
        assert_eq!(tracker.snapshot().passes, completed);
        assert!(!tracker.is_busy());
    }
}
