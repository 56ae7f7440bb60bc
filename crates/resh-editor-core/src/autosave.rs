//! Debounced auto-save.
//!
//! One coordinator per edited document. Changes wait out a quiet window
//! before a save is issued; at most one save is in flight; changes arriving
//! during a save are queued for the next one; failures keep the pending
//! content for retry.
//!
//! ```text
//!            change                    window elapsed
//!   Idle ───────────▶ PendingDebounce ───────────────▶ Saving
//!    ▲                 ▲    │ change (timer resets)       │ │
//!    │                 └────┘                             │ │
//!    └─────────────────────────────── success ────────────┘ │
//!   IdleWithError ◀─────────────────── failure ──────────────┘
//!        │ change / force_save
//!        ▼
//!   PendingDebounce / Saving
//! ```
//!
//! The state machine is synchronous: [`AutoSaveCoordinator::poll`] and
//! [`AutoSaveCoordinator::force_save`] hand out a [`SaveTicket`], the caller
//! performs the save, and [`AutoSaveCoordinator::complete`] records the
//! outcome. [`AutoSaveCoordinator::save_due`] and
//! [`AutoSaveCoordinator::flush`] wrap that cycle around a [`DocumentStore`].

use std::time::Duration;

use chrono::{DateTime, Utc};
use resh_common::{AutoSaveConfig, StoreError};
use web_time::Instant;

use crate::store::{DocumentPatch, DocumentStore, ImageChange, StoredDocument};
use crate::target::EditingTarget;
use crate::timer::TimerRegistry;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AutoSaveStatus {
    /// Nothing pending.
    Idle,
    /// A change is waiting out the debounce window.
    PendingDebounce,
    /// A save is in flight.
    Saving,
    /// The last save failed; the pending change is retained.
    IdleWithError,
}

/// Everything the coordinator persists for a document.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Draft {
    pub content: String,
    pub title: String,
    pub keyword: String,
    pub meta_description: String,
    pub featured_image: Option<u64>,
    pub categories: Vec<u64>,
}

impl Draft {
    pub fn with_content(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            ..Self::default()
        }
    }

    /// Patch carrying only what differs from `saved`.
    pub fn patch_since(&self, saved: &Draft) -> DocumentPatch {
        DocumentPatch {
            content: changed(&self.content, &saved.content),
            title: changed(&self.title, &saved.title),
            keyword: changed(&self.keyword, &saved.keyword),
            meta_description: changed(&self.meta_description, &saved.meta_description),
            featured_image: (self.featured_image != saved.featured_image).then_some(
                match self.featured_image {
                    Some(media_id) => ImageChange::Set { media_id },
                    None => ImageChange::Clear,
                },
            ),
            categories: (self.categories != saved.categories).then(|| self.categories.clone()),
        }
    }
}

fn changed(current: &str, saved: &str) -> Option<String> {
    (current != saved).then(|| current.to_owned())
}

/// Read-only view of the coordinator, for status indicators.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AutoSaveState {
    pub pending_content: Option<String>,
    pub last_saved_content: String,
    pub is_saving: bool,
    pub has_unsaved_changes: bool,
    pub last_saved_at: Option<DateTime<Utc>>,
    pub last_error: Option<StoreError>,
}

/// Permission to run exactly one save. Returned to
/// [`AutoSaveCoordinator::complete`] with the outcome.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SaveTicket {
    id: u64,
    draft: Draft,
    patch: DocumentPatch,
}

impl SaveTicket {
    pub fn patch(&self) -> &DocumentPatch {
        &self.patch
    }

    pub fn content(&self) -> &str {
        &self.draft.content
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum AutoSaveTimer {
    Debounce,
}

#[derive(Debug)]
pub struct AutoSaveCoordinator {
    target: EditingTarget,
    debounce: Duration,
    status: AutoSaveStatus,
    pending: Option<Draft>,
    last_saved: Draft,
    last_saved_at: Option<DateTime<Utc>>,
    last_error: Option<StoreError>,
    in_flight: Option<u64>,
    next_ticket: u64,
    timers: TimerRegistry<AutoSaveTimer>,
}

impl AutoSaveCoordinator {
    /// `saved` is the document as last loaded from the store.
    pub fn new(target: EditingTarget, saved: Draft, config: &AutoSaveConfig) -> Self {
        let debounce = match &target {
            EditingTarget::Original { .. } => config.content_debounce(),
            EditingTarget::Translation { .. } => config.translation_debounce(),
        };
        Self {
            target,
            debounce,
            status: AutoSaveStatus::Idle,
            pending: None,
            last_saved: saved,
            last_saved_at: None,
            last_error: None,
            in_flight: None,
            next_ticket: 0,
            timers: TimerRegistry::new(),
        }
    }

    /// Record a change to the document.
    pub fn observe(&mut self, draft: Draft, now: Instant) {
        if self.status == AutoSaveStatus::Saving {
            // Queued: completion decides whether another save is needed.
            self.pending = Some(draft);
            return;
        }

        if draft == self.last_saved {
            // Edited back to what is already stored.
            self.pending = None;
            self.timers.cancel(AutoSaveTimer::Debounce);
            self.status = AutoSaveStatus::Idle;
            return;
        }

        self.pending = Some(draft);
        self.status = AutoSaveStatus::PendingDebounce;
        self.timers
            .schedule_after(AutoSaveTimer::Debounce, now, self.debounce);
    }

    pub fn observe_content(&mut self, content: impl Into<String>, now: Instant) {
        let mut draft = self.current_draft();
        draft.content = content.into();
        self.observe(draft, now);
    }

    /// Title, focus keyword and meta description, saved alongside the body.
    pub fn set_metadata(
        &mut self,
        title: impl Into<String>,
        keyword: impl Into<String>,
        meta_description: impl Into<String>,
        now: Instant,
    ) {
        let mut draft = self.current_draft();
        draft.title = title.into();
        draft.keyword = keyword.into();
        draft.meta_description = meta_description.into();
        self.observe(draft, now);
    }

    pub fn set_featured_image(&mut self, media_id: Option<u64>, now: Instant) {
        let mut draft = self.current_draft();
        draft.featured_image = media_id;
        self.observe(draft, now);
    }

    pub fn set_categories(&mut self, categories: Vec<u64>, now: Instant) {
        let mut draft = self.current_draft();
        draft.categories = categories;
        self.observe(draft, now);
    }

    /// Start a save if the debounce window has elapsed.
    pub fn poll(&mut self, now: Instant) -> Option<SaveTicket> {
        let fired = self.timers.fire_due(now);
        if fired.contains(&AutoSaveTimer::Debounce) && self.status == AutoSaveStatus::PendingDebounce
        {
            return self.begin_save();
        }
        None
    }

    /// Start a save immediately, bypassing the debounce. Used on tab hide,
    /// unload and explicit save. No-op when nothing is unsaved or a save is
    /// already running.
    pub fn force_save(&mut self) -> Option<SaveTicket> {
        if !self.has_unsaved_changes() || self.status == AutoSaveStatus::Saving {
            tracing::debug!(status = ?self.status, "force save skipped");
            return None;
        }
        self.timers.cancel(AutoSaveTimer::Debounce);
        self.begin_save()
    }

    fn begin_save(&mut self) -> Option<SaveTicket> {
        let draft = self.pending.clone()?;
        let patch = draft.patch_since(&self.last_saved);
        let id = self.next_ticket;
        self.next_ticket += 1;
        self.in_flight = Some(id);
        self.status = AutoSaveStatus::Saving;
        tracing::debug!(document = %self.target, ticket = id, "save started");
        Some(SaveTicket { id, draft, patch })
    }

    /// Record the outcome of the save started with `ticket`.
    pub fn complete(
        &mut self,
        ticket: SaveTicket,
        result: Result<StoredDocument, StoreError>,
        now: Instant,
    ) -> AutoSaveStatus {
        if self.in_flight != Some(ticket.id) {
            tracing::warn!(ticket = ticket.id, "ignoring completion for a save that is not in flight");
            return self.status;
        }
        self.in_flight = None;

        let changed_during_save = self.pending.as_ref() != Some(&ticket.draft);
        match result {
            Ok(stored) => {
                tracing::info!(
                    document = %self.target,
                    revision = stored.revision,
                    "document saved"
                );
                self.last_saved = ticket.draft;
                self.last_saved_at = Some(stored.updated_at);
                self.last_error = None;
                if self.has_unsaved_changes() {
                    self.status = AutoSaveStatus::PendingDebounce;
                    self.timers
                        .schedule_after(AutoSaveTimer::Debounce, now, self.debounce);
                } else {
                    self.pending = None;
                    self.status = AutoSaveStatus::Idle;
                }
            }
            Err(error) => {
                tracing::warn!(document = %self.target, %error, "save failed, keeping changes");
                self.last_error = Some(error);
                if changed_during_save && self.has_unsaved_changes() {
                    self.status = AutoSaveStatus::PendingDebounce;
                    self.timers
                        .schedule_after(AutoSaveTimer::Debounce, now, self.debounce);
                } else {
                    self.status = AutoSaveStatus::IdleWithError;
                }
            }
        }
        self.status
    }

    /// Save through `store` if the debounce window has elapsed.
    pub async fn save_due<S: DocumentStore>(
        &mut self,
        store: &S,
        now: Instant,
    ) -> Option<Result<StoredDocument, StoreError>> {
        let ticket = self.poll(now)?;
        Some(self.run(store, ticket, now).await)
    }

    /// Force a save through `store`. `None` when there was nothing to save.
    pub async fn flush<S: DocumentStore>(
        &mut self,
        store: &S,
        now: Instant,
    ) -> Option<Result<StoredDocument, StoreError>> {
        let ticket = self.force_save()?;
        Some(self.run(store, ticket, now).await)
    }

    async fn run<S: DocumentStore>(
        &mut self,
        store: &S,
        ticket: SaveTicket,
        now: Instant,
    ) -> Result<StoredDocument, StoreError> {
        let result = store.save(&self.target, ticket.patch.clone()).await;
        self.complete(ticket, result.clone(), now);
        result
    }

    /// Cancel the debounce timer. Pending content is kept so a final
    /// [`force_save`](Self::force_save) can still persist it.
    pub fn teardown(&mut self) {
        self.timers.cancel_all();
    }

    fn current_draft(&self) -> Draft {
        self.pending
            .clone()
            .unwrap_or_else(|| self.last_saved.clone())
    }

    pub fn has_unsaved_changes(&self) -> bool {
        self.pending
            .as_ref()
            .is_some_and(|pending| pending != &self.last_saved)
    }

    pub fn status(&self) -> AutoSaveStatus {
        self.status
    }

    pub fn target(&self) -> &EditingTarget {
        &self.target
    }

    pub fn debounce(&self) -> Duration {
        self.debounce
    }

    pub fn next_deadline(&self) -> Option<Instant> {
        self.timers.next_deadline()
    }

    pub fn last_error(&self) -> Option<&StoreError> {
        self.last_error.as_ref()
    }

    pub fn state(&self) -> AutoSaveState {
        AutoSaveState {
            pending_content: self.pending.as_ref().map(|d| d.content.clone()),
            last_saved_content: self.last_saved.content.clone(),
            is_saving: self.status == AutoSaveStatus::Saving,
            has_unsaved_changes: self.has_unsaved_changes(),
            last_saved_at: self.last_saved_at,
            last_error: self.last_error.clone(),
        }
    }
}
