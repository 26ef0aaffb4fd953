//! Admin Staging Session.
//!
//! The console edits one `(plan, material)` context at a time. Toggles are
//! staged locally as a diff against the last-known server state and
//! committed together with [`StagingSession::save_all`].

use std::collections::BTreeMap;
use std::future::Future;

use serde::{Deserialize, Serialize};

use crate::overrides::{BatchOutcome, FailedToggle, OverrideKey, OverrideToggle};
use crate::resolution::Resolution;
use crate::ValidationError;

/// Store operations the session needs. Implemented by the database store
/// and by the console's HTTP client.
pub trait MatrixBackend {
    type Error: std::error::Error + Send + Sync + 'static;

    fn resolve(
        &self,
        plan_id: i64,
        material_key: Option<&str>,
    ) -> impl Future<Output = Result<Resolution, Self::Error>> + Send;

    fn batch_upsert(
        &self,
        plan_id: i64,
        toggles: &[OverrideToggle],
    ) -> impl Future<Output = Result<BatchOutcome, Self::Error>> + Send;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionState {
    Clean,
    Dirty,
    Saving,
}

#[derive(Debug, thiserror::Error)]
pub enum SessionError<E> {
    #[error("no plan loaded")]
    NotLoaded,

    #[error("option {0} is not in the loaded catalog")]
    UnknownOption(i64),

    #[error("a save is already in progress")]
    SaveInProgress,

    #[error("no staged changes to save")]
    NothingToSave,

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("store error: {0}")]
    Backend(#[source] E),
}

/// A batch handed out by [`StagingSession::begin_save`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SaveRequest {
    pub plan_id: i64,
    pub toggles: Vec<OverrideToggle>,
    generation: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SaveReport {
    pub requested: usize,
    pub updated_count: usize,
    pub failed: Vec<FailedToggle>,
}

#[derive(Debug, Default)]
pub struct StagingSession {
    plan_id: Option<i64>,
    material_key: Option<String>,
    resolution: Option<Resolution>,
    staged: BTreeMap<OverrideKey, bool>,
    saving: bool,
    /// Bumped on every context switch so a save that outlives its context
    /// cannot touch the new one.
    generation: u64,
    last_error: Option<String>,
}

impl StagingSession {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn state(&self) -> SessionState {
        if self.saving {
            SessionState::Saving
        } else if self.staged.is_empty() {
            SessionState::Clean
        } else {
            SessionState::Dirty
        }
    }

    #[must_use]
    pub fn plan_id(&self) -> Option<i64> {
        self.plan_id
    }

    #[must_use]
    pub fn material_key(&self) -> Option<&str> {
        self.material_key.as_deref()
    }

    #[must_use]
    pub fn resolution(&self) -> Option<&Resolution> {
        self.resolution.as_ref()
    }

    /// Number of unsaved changes.
    #[must_use]
    pub fn pending_count(&self) -> usize {
        self.staged.len()
    }

    pub fn staged(&self) -> impl Iterator<Item = (&OverrideKey, bool)> {
        self.staged.iter().map(|(k, v)| (k, *v))
    }

    #[must_use]
    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    /// The value a control for `option_id` displays: the staged value if
    /// there is one, else the server value.
    #[must_use]
    pub fn plan_enabled(&self, option_id: i64) -> Option<bool> {
        let resolved = self.resolution.as_ref()?.option(option_id)?;
        let staged = OverrideKey::for_option(
            option_id,
            resolved.option.category,
            self.material_key.as_deref(),
        )
        .ok()
        .and_then(|key| self.staged.get(&key).copied());
        Some(staged.unwrap_or(resolved.plan_enabled))
    }

    /// Switches to `(plan_id, material_key)` and fetches its resolution.
    ///
    /// Any change of plan or material drops every staged edit.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::Backend`] when the resolution cannot be read.
    /// The context still switches, with no resolution loaded.
    pub async fn load<B>(
        &mut self,
        backend: &B,
        plan_id: i64,
        material_key: Option<&str>,
    ) -> Result<(), SessionError<B::Error>>
    where
        B: MatrixBackend + Sync,
    {
        let material_key = material_key.map(str::to_owned);
        if self.plan_id != Some(plan_id) || self.material_key != material_key {
            if !self.staged.is_empty() {
                tracing::debug!(
                    plan_id,
                    discarded = self.staged.len(),
                    "context switch, discarding staged edits"
                );
            }
            self.staged.clear();
            self.generation += 1;
            self.saving = false;
            self.resolution = None;
            self.plan_id = Some(plan_id);
            self.material_key = material_key;
        }
        self.refresh(backend).await
    }

    /// Re-reads the current context, keeping staged edits that still differ
    /// from the server.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::NotLoaded`] before the first [`load`](Self::load)
    /// and [`SessionError::Backend`] when the store read fails.
    pub async fn refresh<B>(&mut self, backend: &B) -> Result<(), SessionError<B::Error>>
    where
        B: MatrixBackend + Sync,
    {
        let plan_id = self.plan_id.ok_or(SessionError::NotLoaded)?;
        match backend.resolve(plan_id, self.material_key.as_deref()).await {
            Ok(resolution) => {
                self.staged
                    .retain(|key, enabled| server_value(&resolution, key) != Some(*enabled));
                self.resolution = Some(resolution);
                Ok(())
            }
            Err(error) => {
                self.last_error = Some(error.to_string());
                Err(SessionError::Backend(error))
            }
        }
    }

    /// Flips the displayed value of `option_id`.
    ///
    /// # Errors
    ///
    /// See [`set`](Self::set).
    pub fn toggle<E>(&mut self, option_id: i64) -> Result<bool, SessionError<E>> {
        let current = self
            .plan_enabled(option_id)
            .ok_or_else(|| self.missing_option(option_id))?;
        self.set(option_id, !current)?;
        Ok(!current)
    }

    /// Stages `enabled` for `option_id` in the current context. Staging the
    /// server value removes the edit instead.
    ///
    /// # Errors
    ///
    /// Rejected while saving, before a resolution is loaded, for options not
    /// in the loaded catalog, and for scoped options when no material is
    /// selected.
    pub fn set<E>(&mut self, option_id: i64, enabled: bool) -> Result<(), SessionError<E>> {
        if self.saving {
            return Err(SessionError::SaveInProgress);
        }
        let resolution = self.resolution.as_ref().ok_or(SessionError::NotLoaded)?;
        let resolved = resolution
            .option(option_id)
            .ok_or(SessionError::UnknownOption(option_id))?;
        let key = OverrideKey::for_option(
            option_id,
            resolved.option.category,
            self.material_key.as_deref(),
        )?;

        if resolved.plan_enabled == enabled {
            self.staged.remove(&key);
        } else {
            self.staged.insert(key, enabled);
        }
        Ok(())
    }

    /// Drops every staged edit. Legal in any state; a save already in flight
    /// still completes.
    pub fn discard(&mut self) {
        self.staged.clear();
        self.last_error = None;
    }

    /// Enters `Saving` and hands out the batch to send.
    ///
    /// # Errors
    ///
    /// [`SessionError::SaveInProgress`] while saving and
    /// [`SessionError::NothingToSave`] when clean.
    pub fn begin_save<E>(&mut self) -> Result<SaveRequest, SessionError<E>> {
        if self.saving {
            return Err(SessionError::SaveInProgress);
        }
        let plan_id = self.plan_id.ok_or(SessionError::NotLoaded)?;
        if self.staged.is_empty() {
            return Err(SessionError::NothingToSave);
        }

        self.saving = true;
        self.last_error = None;
        Ok(SaveRequest {
            plan_id,
            toggles: self
                .staged
                .iter()
                .map(|(key, enabled)| key.to_toggle(*enabled))
                .collect(),
            generation: self.generation,
        })
    }

    /// Applies the store's answer to a batch from [`begin_save`](Self::begin_save).
    ///
    /// Applied keys leave the staged set and are reflected in the cached
    /// resolution. Keys the store reported as failed stay staged.
    ///
    /// # Errors
    ///
    /// A failed request returns [`SessionError::Backend`] with every staged
    /// edit retained.
    pub fn complete_save<E>(
        &mut self,
        request: &SaveRequest,
        outcome: Result<BatchOutcome, E>,
    ) -> Result<SaveReport, SessionError<E>>
    where
        E: std::error::Error,
    {
        let current = request.generation == self.generation;
        if current {
            self.saving = false;
        }

        let outcome = match outcome {
            Ok(outcome) => outcome,
            Err(error) => {
                tracing::warn!(
                    plan_id = request.plan_id,
                    staged = self.staged.len(),
                    error = %error,
                    "batch save failed"
                );
                if current {
                    self.last_error = Some(error.to_string());
                }
                return Err(SessionError::Backend(error));
            }
        };

        if current {
            let failed: Vec<OverrideKey> = outcome.failed.iter().map(FailedToggle::key).collect();
            for toggle in &request.toggles {
                let key = toggle.key();
                if failed.contains(&key) {
                    continue;
                }
                if self.staged.get(&key) == Some(&toggle.enabled) {
                    self.staged.remove(&key);
                }
                self.apply_committed(&key, toggle.enabled);
            }
            if !outcome.failed.is_empty() {
                self.last_error = Some(format!(
                    "{} of {} changes were not saved",
                    outcome.failed.len(),
                    request.toggles.len()
                ));
            }
        }

        Ok(SaveReport {
            requested: request.toggles.len(),
            updated_count: outcome.updated_count,
            failed: outcome.failed,
        })
    }

    /// Commits every staged edit and re-reads the context.
    ///
    /// Once the batch is accepted the report is returned even if the re-read
    /// fails; the cached resolution then keeps the committed values and
    /// [`last_error`](Self::last_error) carries the read error.
    ///
    /// # Errors
    ///
    /// Fails without sending anything unless the session is `Dirty`. A store
    /// failure leaves the session `Dirty` with the same pending count.
    pub async fn save_all<B>(&mut self, backend: &B) -> Result<SaveReport, SessionError<B::Error>>
    where
        B: MatrixBackend + Sync,
    {
        let request = self.begin_save::<B::Error>()?;
        let outcome = backend.batch_upsert(request.plan_id, &request.toggles).await;
        let report = self.complete_save(&request, outcome)?;
        tracing::info!(
            plan_id = request.plan_id,
            requested = report.requested,
            updated = report.updated_count,
            failed = report.failed.len(),
            "staged edits saved"
        );
        if let Err(error) = self.refresh(backend).await {
            tracing::warn!(
                plan_id = request.plan_id,
                error = %error,
                "re-read after save failed, keeping committed values"
            );
        }
        Ok(report)
    }

    fn apply_committed(&mut self, key: &OverrideKey, enabled: bool) {
        if key
            .material_scope()
            .is_some_and(|scope| Some(scope) != self.material_key.as_deref())
        {
            return;
        }
        let Some(resolution) = self.resolution.as_mut() else {
            return;
        };
        if let Some(resolved) = resolution
            .options
            .iter_mut()
            .find(|r| r.option.id == key.option_id())
        {
            resolved.plan_enabled = enabled;
            resolved.configured = true;
        }
    }

    fn missing_option<E>(&self, option_id: i64) -> SessionError<E> {
        if self.resolution.is_none() {
            SessionError::NotLoaded
        } else {
            SessionError::UnknownOption(option_id)
        }
    }
}

fn server_value(resolution: &Resolution, key: &OverrideKey) -> Option<bool> {
    resolution
        .option(key.option_id())
        .map(|resolved| resolved.plan_enabled)
}

#[cfg(test)]
#[path = "staging_test.rs"]
mod tests;
