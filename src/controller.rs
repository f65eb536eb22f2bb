// 🎛️ Board Controller - the single owner of board state
//
// Flow for every intent:
//   intent → AccessGate → OverrideSet mutation → persist → resolve → rotate
//   snapshot → push to Renderer
//
// Nothing here returns a hard fault. Refusals come back as `AccessDenied`
// AND as a renderer notification; persistence failures only notify.

use tracing::{error, info, warn};

use crate::board::{BoardSnapshot, BoardTracker, ChangeFlags, RecomputeOutcome};
use crate::error::AccessDenied;
use crate::gate::{AccessGate, ConfirmState, PendingIntent};
use crate::overrides::{OverrideChange, OverrideSet, OverrideTarget};
use crate::reference::ReferenceData;
use crate::resolver::ResolvedRates;
use crate::store::{load_state, save_lock, save_overrides, KeyValueStore};

// ============================================================================
// RENDERER SURFACE
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Success,
    Warning,
    Error,
}

/// What the core pushes out. Implementors own all presentation timers.
pub trait Renderer {
    fn on_rates_resolved(&mut self, rates: &ResolvedRates, changes: &ChangeFlags);
    fn on_lock_state_changed(&mut self, locked: bool);
    fn on_notify(&mut self, message: &str, severity: Severity);
}

/// Discards everything (export / one-shot commands)
#[derive(Debug, Default, Clone, Copy)]
pub struct NullRenderer;

impl Renderer for NullRenderer {
    fn on_rates_resolved(&mut self, _rates: &ResolvedRates, _changes: &ChangeFlags) {}
    fn on_lock_state_changed(&mut self, _locked: bool) {}
    fn on_notify(&mut self, _message: &str, _severity: Severity) {}
}

// ============================================================================
// CONTROLLER
// ============================================================================

pub struct BoardController<R: Renderer> {
    reference: ReferenceData,
    overrides: OverrideSet,
    tracker: BoardTracker,
    gate: AccessGate,
    store: Box<dyn KeyValueStore>,
    renderer: R,
}

impl<R: Renderer> BoardController<R> {
    /// Load persisted state, resolve the board once and push it out
    pub fn start(
        reference: ReferenceData,
        store: Box<dyn KeyValueStore>,
        passphrase_digest: String,
        renderer: R,
    ) -> Self {
        let state = load_state(store.as_ref());
        let load_failed = !state.is_clean();

        let mut controller = BoardController {
            reference,
            overrides: state.overrides,
            tracker: BoardTracker::new(),
            gate: AccessGate::new(passphrase_digest, state.locked),
            store,
            renderer,
        };

        info!(
            overrides = controller.overrides.len(),
            locked = controller.gate.is_locked(),
            "board started"
        );

        if load_failed {
            controller.renderer.on_notify(
                "Some stored overrides could not be read; defaults in use",
                Severity::Warning,
            );
        }
        let locked = controller.gate.is_locked();
        controller.renderer.on_lock_state_changed(locked);
        controller.recompute();
        controller
            .renderer
            .on_notify("Rates loaded from local data", Severity::Warning);

        controller
    }

    // ========================================================================
    // INTENTS
    // ========================================================================

    /// Set or clear one override from raw operator text
    pub fn submit_override(
        &mut self,
        target: OverrideTarget,
        raw: &str,
    ) -> Result<OverrideChange, AccessDenied> {
        if let Err(denied) = self.gate.require_edit() {
            return Err(self.refuse(denied));
        }
        if !self.is_known(&target) {
            let denied = AccessDenied::UnknownTarget(target.to_string());
            warn!("intent refused: {}", denied);
            self.renderer.on_notify(&denied.to_string(), Severity::Warning);
            return Err(denied);
        }

        let change = self.overrides.apply(&target, raw);
        let message = match change {
            OverrideChange::Set(value) => {
                info!(%target, value, "override set");
                format!("{} rate updated for {}", target.category().title(), target.key())
            }
            OverrideChange::Cleared => {
                info!(%target, "override cleared");
                format!("Manual override removed for {}", target.key())
            }
        };
        self.renderer.on_notify(&message, Severity::Success);

        self.persist_overrides();
        self.recompute();
        Ok(change)
    }

    /// Park a reset-all until confirmed
    pub fn request_reset(&mut self) -> Result<PendingIntent, AccessDenied> {
        if let Err(denied) = self.gate.require_edit() {
            return Err(self.refuse(denied));
        }
        let intent = PendingIntent::ResetAllOverrides;
        self.gate.request_confirmation(intent);
        Ok(intent)
    }

    pub fn confirm_reset(&mut self) -> Result<(), AccessDenied> {
        if let Err(denied) = self.gate.require_edit() {
            return Err(self.refuse(denied));
        }
        let intent = self.gate.confirm().map_err(|denied| {
            warn!("confirm without pending intent");
            denied
        })?;

        match intent {
            PendingIntent::ResetAllOverrides => self.reset_all(),
        }
        Ok(())
    }

    /// Drop the pending intent. Returns whether one was pending.
    pub fn cancel_reset(&mut self) -> bool {
        self.gate.cancel().is_some()
    }

    /// Returns the new lock state
    pub fn attempt_unlock_toggle(&mut self, password: &str) -> Result<bool, AccessDenied> {
        let locked = match self.gate.toggle_lock(password) {
            Ok(locked) => locked,
            Err(denied) => return Err(self.refuse(denied)),
        };

        if let Err(e) = save_lock(self.store.as_mut(), locked) {
            error!("failed to persist lock flag: {}", e);
            self.renderer
                .on_notify("Lock state could not be saved", Severity::Error);
        }

        self.renderer.on_lock_state_changed(locked);
        let message = if locked { "Page locked" } else { "Page unlocked" };
        self.renderer.on_notify(message, Severity::Success);
        Ok(locked)
    }

    pub fn attempt_edit_access(&mut self, password: &str) -> Result<(), AccessDenied> {
        self.gate.open_edit(password).map_err(|denied| self.refuse(denied))
    }

    pub fn close_edit_panel(&mut self) {
        self.gate.close_edit();
    }

    /// Re-resolve and push. Callers that hit `Dropped` re-trigger themselves.
    pub fn recompute(&mut self) -> RecomputeOutcome {
        let outcome = self.tracker.recompute(&self.reference, &self.overrides);
        if let RecomputeOutcome::Completed(changes) = &outcome {
            let rates = self.tracker.current();
            self.renderer.on_rates_resolved(&rates, changes);
        }
        outcome
    }

    fn reset_all(&mut self) {
        let removed = self.overrides.len();
        self.overrides.clear_all();
        info!(removed, "all overrides reset");

        self.persist_overrides();
        self.recompute();
        self.renderer
            .on_notify("All manual overrides have been reset", Severity::Success);
    }

    fn persist_overrides(&mut self) {
        if let Err(e) = save_overrides(self.store.as_mut(), &self.overrides) {
            // In-memory set stays authoritative for the session
            error!("failed to persist overrides: {}", e);
            self.renderer
                .on_notify("Overrides could not be saved; changes kept for this session", Severity::Error);
        }
    }

    fn refuse(&mut self, denied: AccessDenied) -> AccessDenied {
        warn!("intent refused: {}", denied);
        self.renderer.on_notify(&denied.to_string(), Severity::Error);
        denied
    }

    fn is_known(&self, target: &OverrideTarget) -> bool {
        match target {
            OverrideTarget::Buy(code) | OverrideTarget::Sell(code) => {
                self.reference.currency(code).is_some()
            }
            OverrideTarget::Interest(label) => self.reference.term(label).is_some(),
        }
    }

    // ========================================================================
    // READ ACCESS
    // ========================================================================

    pub fn reference(&self) -> &ReferenceData {
        &self.reference
    }

    pub fn overrides(&self) -> &OverrideSet {
        &self.overrides
    }

    pub fn is_overridden(&self, target: &OverrideTarget) -> bool {
        self.overrides.contains(target)
    }

    pub fn current_rates(&self) -> ResolvedRates {
        self.tracker.current()
    }

    pub fn snapshot(&self) -> BoardSnapshot {
        self.tracker.snapshot()
    }

    pub fn is_changed(&self, target: &OverrideTarget) -> bool {
        self.tracker.is_changed(target)
    }

    pub fn is_locked(&self) -> bool {
        self.gate.is_locked()
    }

    pub fn is_edit_open(&self) -> bool {
        self.gate.is_edit_open()
    }

    pub fn confirm_state(&self) -> ConfirmState {
        self.gate.confirm_state()
    }

    pub fn renderer(&self) -> &R {
        &self.renderer
    }

    pub fn renderer_mut(&mut self) -> &mut R {
        &mut self.renderer
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{BoardError, Result};
    use crate::gate::hash_passphrase;
    use crate::resolver::resolve_all;
    use crate::store::{MemoryStore, FOREX_BUY_STORAGE_KEY, LOCK_STORAGE_KEY};
    use approx::assert_relative_eq;

    const SECRET: &str = "duckduckgoose";

    #[derive(Debug, Clone, PartialEq)]
    enum Pushed {
        Rates(usize),
        Lock(bool),
        Notice(String, Severity),
    }

    #[derive(Default)]
    struct RecordingRenderer {
        events: Vec<Pushed>,
    }

    impl RecordingRenderer {
        fn notices(&self) -> Vec<(String, Severity)> {
            self.events
                .iter()
                .filter_map(|e| match e {
                    Pushed::Notice(m, s) => Some((m.clone(), *s)),
                    _ => None,
                })
                .collect()
        }

        fn last_notice(&self) -> Option<(String, Severity)> {
            self.notices().pop()
        }
    }

    impl Renderer for RecordingRenderer {
        fn on_rates_resolved(&mut self, _rates: &ResolvedRates, changes: &ChangeFlags) {
            self.events.push(Pushed::Rates(changes.len()));
        }

        fn on_lock_state_changed(&mut self, locked: bool) {
            self.events.push(Pushed::Lock(locked));
        }

        fn on_notify(&mut self, message: &str, severity: Severity) {
            self.events.push(Pushed::Notice(message.to_string(), severity));
        }
    }

    /// Reads nothing, refuses every write
    struct FailingStore;

    impl KeyValueStore for FailingStore {
        fn get(&self, _key: &str) -> Result<Option<String>> {
            Err(BoardError::Persistence("disk on fire".to_string()))
        }

        fn write_batch(&mut self, _entries: &[(&str, String)]) -> Result<()> {
            Err(BoardError::Persistence("disk on fire".to_string()))
        }
    }

    fn start_with(store: Box<dyn KeyValueStore>) -> BoardController<RecordingRenderer> {
        BoardController::start(
            ReferenceData::zambian_kwacha(),
            store,
            hash_passphrase(SECRET),
            RecordingRenderer::default(),
        )
    }

    fn start() -> BoardController<RecordingRenderer> {
        start_with(Box::new(MemoryStore::new()))
    }

    fn opened() -> BoardController<RecordingRenderer> {
        let mut board = start();
        board.attempt_edit_access(SECRET).unwrap();
        board
    }

    #[test]
    fn test_start_resolves_defaults() {
        let board = start();
        let rates = board.current_rates();

        assert_relative_eq!(rates.buying["USD"], 22.93475, epsilon = 1e-9);
        assert_relative_eq!(rates.selling["USD"], 23.16525, epsilon = 1e-9);
        assert!(board.renderer().events.contains(&Pushed::Lock(false)));
        assert!(board.renderer().events.contains(&Pushed::Rates(0)));
        assert!(!board.is_changed(&OverrideTarget::buy("USD")));
    }

    #[test]
    fn test_usd_override_scenario() {
        let mut board = opened();

        let change = board.submit_override(OverrideTarget::buy("USD"), "23.00").unwrap();

        assert_eq!(change, OverrideChange::Set(23.0));
        assert_eq!(board.current_rates().buying["USD"], 23.00);
        assert!(board.is_changed(&OverrideTarget::buy("USD")));
        assert!(board.is_overridden(&OverrideTarget::buy("USD")));
        assert_eq!(
            board.renderer().last_notice(),
            Some(("Buying rate updated for USD".to_string(), Severity::Success))
        );
    }

    #[test]
    fn test_blank_interest_input_clears() {
        let mut board = opened();
        let target = OverrideTarget::interest("30 Days Fixed");
        board.submit_override(target.clone(), "5.10").unwrap();
        assert_eq!(board.current_rates().interest["30 Days Fixed"], 5.10);

        let change = board.submit_override(target.clone(), "").unwrap();

        assert_eq!(change, OverrideChange::Cleared);
        assert_eq!(board.current_rates().interest["30 Days Fixed"], 4.55);
        assert!(!board.is_overridden(&target));
        assert_eq!(
            board.renderer().last_notice(),
            Some(("Manual override removed for 30 Days Fixed".to_string(), Severity::Success))
        );
    }

    #[test]
    fn test_same_value_twice_is_idempotent() {
        let mut board = opened();
        let target = OverrideTarget::sell("GBP");

        board.submit_override(target.clone(), "31.50").unwrap();
        let overrides_first = board.overrides().clone();
        let rates_first = board.current_rates();

        board.submit_override(target, "31.50").unwrap();

        assert_eq!(board.overrides(), &overrides_first);
        assert_eq!(board.current_rates(), rates_first);
        assert!(board.snapshot().current == board.snapshot().previous);
    }

    #[test]
    fn test_override_requires_open_panel() {
        let mut board = start();

        let result = board.submit_override(OverrideTarget::buy("USD"), "23.00");

        assert_eq!(result, Err(AccessDenied::EditPanelClosed));
        assert!(board.overrides().is_empty());
    }

    #[test]
    fn test_unknown_target_refused() {
        let mut board = opened();

        let result = board.submit_override(OverrideTarget::buy("XXX"), "1.0");

        assert!(matches!(result, Err(AccessDenied::UnknownTarget(_))));
        assert!(board.overrides().is_empty());
        assert_eq!(board.renderer().last_notice().map(|n| n.1), Some(Severity::Warning));
    }

    #[test]
    fn test_overrides_persist_across_restart() {
        let mut board = opened();
        board.submit_override(OverrideTarget::buy("USD"), "23.00").unwrap();
        board.attempt_unlock_toggle(SECRET).unwrap();

        // Hand the same store contents to a fresh controller
        let mut store = MemoryStore::new();
        save_overrides(&mut store, board.overrides()).unwrap();
        save_lock(&mut store, board.is_locked()).unwrap();
        let restarted = start_with(Box::new(store));

        assert_eq!(restarted.current_rates().buying["USD"], 23.00);
        assert!(restarted.is_locked());
    }

    #[test]
    fn test_reset_cancel_then_confirm() {
        let mut board = opened();
        board.submit_override(OverrideTarget::buy("USD"), "23.00").unwrap();
        board.submit_override(OverrideTarget::interest("BOZ Policy Rate"), "13.5").unwrap();
        let before = board.overrides().clone();

        board.request_reset().unwrap();
        assert!(board.cancel_reset());
        assert_eq!(board.overrides(), &before);
        assert_eq!(board.confirm_reset(), Err(AccessDenied::NothingPending));

        board.request_reset().unwrap();
        board.confirm_reset().unwrap();

        assert!(board.overrides().is_empty());
        let defaults = resolve_all(board.reference(), &OverrideSet::new());
        assert_eq!(board.current_rates(), defaults);
        assert_eq!(
            board.renderer().last_notice(),
            Some(("All manual overrides have been reset".to_string(), Severity::Success))
        );
    }

    #[test]
    fn test_closing_panel_drops_pending_reset() {
        let mut board = opened();
        board.submit_override(OverrideTarget::buy("USD"), "23.00").unwrap();

        board.request_reset().unwrap();
        board.close_edit_panel();

        assert!(!board.is_edit_open());
        assert_eq!(board.confirm_state(), ConfirmState::Idle);
        assert_eq!(board.confirm_reset(), Err(AccessDenied::EditPanelClosed));
        assert_eq!(board.overrides().len(), 1);
        assert_eq!(board.renderer().last_notice().map(|n| n.1), Some(Severity::Error));
    }

    #[test]
    fn test_reset_requires_open_panel() {
        let mut board = start();
        assert_eq!(board.request_reset(), Err(AccessDenied::EditPanelClosed));
        assert_eq!(board.confirm_state(), ConfirmState::Idle);
    }

    #[test]
    fn test_locked_board_refuses_edit_with_correct_password() {
        let mut board = start();
        assert_eq!(board.attempt_unlock_toggle(SECRET), Ok(true));

        assert_eq!(board.attempt_edit_access(SECRET), Err(AccessDenied::Locked));
        assert!(!board.is_edit_open());
        assert_eq!(
            board.renderer().last_notice(),
            Some((
                "Cannot open manual panel while page is locked".to_string(),
                Severity::Error
            ))
        );
    }

    #[test]
    fn test_wrong_password_changes_nothing() {
        let mut board = start();

        assert_eq!(board.attempt_unlock_toggle("nope"), Err(AccessDenied::IncorrectPassword));
        assert_eq!(board.attempt_edit_access("nope"), Err(AccessDenied::IncorrectPassword));

        assert!(!board.is_locked());
        assert!(!board.is_edit_open());
        assert_eq!(
            board.renderer().last_notice(),
            Some(("Incorrect password".to_string(), Severity::Error))
        );
    }

    #[test]
    fn test_lock_toggle_notifies_renderer() {
        let mut board = start();

        board.attempt_unlock_toggle(SECRET).unwrap();
        assert_eq!(board.renderer().events.last(), Some(&Pushed::Notice("Page locked".to_string(), Severity::Success)));
        assert!(board.renderer().events.contains(&Pushed::Lock(true)));

        board.attempt_unlock_toggle(SECRET).unwrap();
        assert!(!board.is_locked());
        assert_eq!(board.renderer().last_notice().map(|n| n.0), Some("Page unlocked".to_string()));
    }

    #[test]
    fn test_corrupt_store_starts_with_defaults() {
        let store = MemoryStore::with_entries(&[
            (FOREX_BUY_STORAGE_KEY, "garbage"),
            (LOCK_STORAGE_KEY, "true"),
        ]);

        let board = start_with(Box::new(store));

        assert!(board.overrides().is_empty());
        assert!(board.is_locked());
        assert!(board
            .renderer()
            .notices()
            .iter()
            .any(|(_, severity)| *severity == Severity::Warning));
    }

    #[test]
    fn test_write_failure_keeps_session_state() {
        let mut board = start_with(Box::new(FailingStore));
        assert!(!board.is_locked());
        board.attempt_edit_access(SECRET).unwrap();

        let change = board.submit_override(OverrideTarget::sell("EUR"), "27.50").unwrap();

        assert_eq!(change, OverrideChange::Set(27.5));
        assert_eq!(board.current_rates().selling["EUR"], 27.50);
        assert!(board
            .renderer()
            .notices()
            .iter()
            .any(|(m, s)| *s == Severity::Error && m.contains("could not be saved")));
    }
}
