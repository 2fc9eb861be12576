//! Account state machine and credential checks.
//!
//! `inactive` → `active` through activation, `active` ↔ `locked` through
//! admin action. Every transition validates its source state and returns a
//! [`TransitionError`] instead of writing arbitrary state.

use time::{Duration, OffsetDateTime};
use uuid::Uuid;

use super::repo_types::{AccountState, UserAccount};
use super::validation;
use crate::auth::{password::CredentialHasher, tokens};
use crate::error::{AppResult, FieldErrors, TransitionError};

/// Which stored digest a supplied token is checked against.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DigestKind {
    Activation,
    Reset,
    Remember,
}

impl UserAccount {
    /// Builds a fresh, unactivated account together with its one-time
    /// activation token. Inputs are expected to be validated already.
    pub fn register(
        hasher: &CredentialHasher,
        name: &str,
        email: &str,
        password: &str,
        now: OffsetDateTime,
    ) -> anyhow::Result<(Self, String)> {
        let activation = tokens::issue(hasher)?;
        let account = Self {
            id: Uuid::new_v4(),
            name: name.trim().to_string(),
            email: validation::normalize_email(email),
            password_digest: hasher.hash(password)?,
            admin: false,
            state: AccountState::Inactive,
            activation_digest: Some(activation.digest),
            remember_digest: None,
            reset_digest: None,
            reset_sent_at: None,
            activated_at: None,
            locked_at: None,
            created_at: now,
            updated_at: now,
            lock_version: 0,
        };
        Ok((account, activation.token))
    }

    pub fn is_active(&self) -> bool {
        self.state == AccountState::Active
    }

    pub fn activate(&mut self, now: OffsetDateTime) -> Result<(), TransitionError> {
        self.transition(AccountState::Inactive, "activate")?;
        self.state = AccountState::Active;
        self.activated_at = Some(now);
        self.updated_at = now;
        Ok(())
    }

    pub fn lock(&mut self, now: OffsetDateTime) -> Result<(), TransitionError> {
        self.transition(AccountState::Active, "lock")?;
        self.state = AccountState::Locked;
        self.locked_at = Some(now);
        self.updated_at = now;
        Ok(())
    }

    pub fn unlock(&mut self, now: OffsetDateTime) -> Result<(), TransitionError> {
        self.transition(AccountState::Locked, "unlock")?;
        self.state = AccountState::Active;
        self.locked_at = None;
        self.updated_at = now;
        Ok(())
    }

    fn transition(
        &self,
        required: AccountState,
        action: &'static str,
    ) -> Result<(), TransitionError> {
        if self.state == required {
            Ok(())
        } else {
            Err(TransitionError {
                from: self.state,
                action,
            })
        }
    }

    /// Replaces any pending reset with a new one and returns its token.
    pub fn create_reset_digest(
        &mut self,
        hasher: &CredentialHasher,
        now: OffsetDateTime,
    ) -> anyhow::Result<String> {
        let reset = tokens::issue(hasher)?;
        self.reset_digest = Some(reset.digest);
        self.reset_sent_at = Some(now);
        self.updated_at = now;
        Ok(reset.token)
    }

    pub fn clear_reset(&mut self, now: OffsetDateTime) {
        self.reset_digest = None;
        self.reset_sent_at = None;
        self.updated_at = now;
    }

    /// No pending reset counts as expired.
    pub fn is_reset_expired(&self, now: OffsetDateTime, window: Duration) -> bool {
        match self.reset_sent_at {
            Some(sent_at) => sent_at < now - window,
            None => true,
        }
    }

    /// Stores the digest of a freshly issued remember token.
    pub fn remember(&mut self, digest: String, now: OffsetDateTime) {
        self.remember_digest = Some(digest);
        self.updated_at = now;
    }

    pub fn forget(&mut self, now: OffsetDateTime) {
        self.remember_digest = None;
        self.updated_at = now;
    }

    /// Side-effect free; a missing digest never matches.
    pub fn authenticated(&self, hasher: &CredentialHasher, kind: DigestKind, token: &str) -> bool {
        let digest = match kind {
            DigestKind::Activation => self.activation_digest.as_deref(),
            DigestKind::Reset => self.reset_digest.as_deref(),
            DigestKind::Remember => self.remember_digest.as_deref(),
        };
        hasher.verify(digest, token)
    }

    pub fn password_matches(&self, hasher: &CredentialHasher, candidate: &str) -> bool {
        hasher.verify(Some(&self.password_digest), candidate)
    }

    /// Validates and re-hashes a new password.
    pub fn set_password(
        &mut self,
        hasher: &CredentialHasher,
        password: &str,
        confirmation: &str,
        now: OffsetDateTime,
    ) -> AppResult<()> {
        let mut errors = FieldErrors::new();
        validation::validate_password(&mut errors, password, confirmation);
        errors.into_result()?;
        self.password_digest = hasher.hash(password)?;
        self.updated_at = now;
        Ok(())
    }
}
