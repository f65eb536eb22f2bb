//! Access Control Gate
//!
//! A shared passphrase gates two privileged actions: toggling the page lock
//! and opening the manual-override panel. The lock flag outranks the
//! passphrase for the panel. Destructive actions go through a two-step
//! confirmation.
//!
//! ```plain
//! Confirmation State Machine:
//!
//!              request(intent)
//!   ┌──────┐ ───────────────────► ┌──────────────────┐
//!   │ Idle │                      │ Pending(intent)  │──┐ request(other)
//!   └──────┘ ◄─────────────────── └──────────────────┘◄─┘ (replaces)
//!             confirm → execute
//!             cancel  → discard
//! ```
//!
//! This is an operational speed-bump, not a security boundary: the passphrase
//! is kept as a SHA-256 digest and compared with plain equality.

use sha2::{Digest, Sha256};
use tracing::{info, warn};

use crate::error::AccessDenied;

/// Hex SHA-256 of a passphrase
pub fn hash_passphrase(passphrase: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(passphrase.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Actions that need an explicit confirm
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PendingIntent {
    ResetAllOverrides,
}

impl PendingIntent {
    /// Prompt shown while the intent waits
    pub fn prompt(&self) -> &'static str {
        match self {
            PendingIntent::ResetAllOverrides => "This will remove all manual overrides. Are you sure?",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConfirmState {
    #[default]
    Idle,
    Pending(PendingIntent),
}

#[derive(Debug, Clone)]
pub struct AccessGate {
    /// SHA-256 hex digest of the shared passphrase
    passphrase_digest: String,
    locked: bool,
    edit_open: bool,
    confirm: ConfirmState,
}

impl AccessGate {
    pub fn new(passphrase_digest: String, locked: bool) -> Self {
        AccessGate {
            passphrase_digest: passphrase_digest.to_lowercase(),
            locked,
            edit_open: false,
            confirm: ConfirmState::Idle,
        }
    }

    /// Convenience for tests and plain-text config
    pub fn with_passphrase(passphrase: &str, locked: bool) -> Self {
        Self::new(hash_passphrase(passphrase), locked)
    }

    pub fn is_locked(&self) -> bool {
        self.locked
    }

    pub fn is_edit_open(&self) -> bool {
        self.edit_open
    }

    pub fn confirm_state(&self) -> ConfirmState {
        self.confirm
    }

    pub fn pending(&self) -> Option<PendingIntent> {
        match self.confirm {
            ConfirmState::Idle => None,
            ConfirmState::Pending(intent) => Some(intent),
        }
    }

    pub fn check_password(&self, supplied: &str) -> bool {
        hash_passphrase(supplied) == self.passphrase_digest
    }

    // ========================================================================
    // LOCK
    // ========================================================================

    /// Flip the lock. Returns the new lock state.
    ///
    /// Locking ends any open edit session and discards a pending confirmation.
    pub fn toggle_lock(&mut self, supplied: &str) -> Result<bool, AccessDenied> {
        if !self.check_password(supplied) {
            warn!("lock toggle refused: incorrect password");
            return Err(AccessDenied::IncorrectPassword);
        }

        self.locked = !self.locked;
        if self.locked {
            self.edit_open = false;
            self.confirm = ConfirmState::Idle;
        }
        info!(locked = self.locked, "lock toggled");
        Ok(self.locked)
    }

    // ========================================================================
    // EDIT PANEL
    // ========================================================================

    /// Lock is checked before the password, which is never looked at while locked.
    pub fn open_edit(&mut self, supplied: &str) -> Result<(), AccessDenied> {
        if self.locked {
            warn!("edit access refused: page locked");
            return Err(AccessDenied::Locked);
        }
        if !self.check_password(supplied) {
            warn!("edit access refused: incorrect password");
            return Err(AccessDenied::IncorrectPassword);
        }

        self.edit_open = true;
        info!("manual panel opened");
        Ok(())
    }

    /// Also discards a pending confirmation
    pub fn close_edit(&mut self) {
        self.edit_open = false;
        self.confirm = ConfirmState::Idle;
    }

    pub fn require_edit(&self) -> Result<(), AccessDenied> {
        if self.locked {
            Err(AccessDenied::Locked)
        } else if !self.edit_open {
            Err(AccessDenied::EditPanelClosed)
        } else {
            Ok(())
        }
    }

    // ========================================================================
    // CONFIRMATION
    // ========================================================================

    /// Park an intent. Returns whatever intent it replaced.
    pub fn request_confirmation(&mut self, intent: PendingIntent) -> Option<PendingIntent> {
        let replaced = self.pending();
        self.confirm = ConfirmState::Pending(intent);
        replaced
    }

    /// Take the pending intent for execution
    pub fn confirm(&mut self) -> Result<PendingIntent, AccessDenied> {
        match std::mem::take(&mut self.confirm) {
            ConfirmState::Pending(intent) => Ok(intent),
            ConfirmState::Idle => Err(AccessDenied::NothingPending),
        }
    }

    /// Discard the pending intent, if any
    pub fn cancel(&mut self) -> Option<PendingIntent> {
        match std::mem::take(&mut self.confirm) {
            ConfirmState::Pending(intent) => Some(intent),
            ConfirmState::Idle => None,
        }
    }
}
