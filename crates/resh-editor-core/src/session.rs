//! One editing session: a document, its view, and everything downstream.
//!
//! Deliveries go to the render coordinator. Commits coming out of it feed the
//! auto-save coordinator and refresh the SEO score and word count. Closing
//! the session cancels every timer and reports whether a final save is
//! still needed.

use resh_common::{EditorConfig, StoreError};
use web_time::Instant;

use crate::autosave::{AutoSaveCoordinator, AutoSaveState, AutoSaveStatus, Draft, SaveTicket};
use crate::normalize::{MarkdownRenderer, MarkupRenderer, word_count};
use crate::render::{CommittedChange, DeliverOutcome, RenderCoordinator, RenderEvent, ViewMode};
use crate::seo::{ScoreBreakdown, ScoredCandidate, score_breakdown};
use crate::store::{DocumentStore, StoredDocument};
use crate::stream::StreamTarget;
use crate::target::EditingTarget;
use crate::view::ViewSink;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    Render(RenderEvent),
    /// SEO score recomputed after a commit or an input change.
    Rescored(ScoreBreakdown),
}

pub struct EditorSession<V, R = MarkdownRenderer> {
    render: RenderCoordinator<V, R>,
    autosave: AutoSaveCoordinator,
    seo: ScoredCandidate,
    score: ScoreBreakdown,
    word_count: usize,
    closed: bool,
}

impl<V: ViewSink> EditorSession<V, MarkdownRenderer> {
    pub fn new(target: EditingTarget, view: V, saved: Draft, config: &EditorConfig) -> Self {
        Self::with_renderer(target, view, MarkdownRenderer, saved, config)
    }
}

impl<V: ViewSink, R: MarkupRenderer> EditorSession<V, R> {
    /// Start a session. `saved` is the document as last persisted; the view
    /// is expected to already show its content.
    pub fn with_renderer(
        target: EditingTarget,
        view: V,
        renderer: R,
        saved: Draft,
        config: &EditorConfig,
    ) -> Self {
        let seo = ScoredCandidate::new(
            saved.title.clone(),
            saved.meta_description.clone(),
            saved.keyword.clone(),
        );
        let score = score_breakdown(&seo);
        let words = word_count(&saved.content);
        tracing::debug!(document = %target, words, "editor session opened");
        Self {
            render: RenderCoordinator::with_renderer(view, renderer, config.render.clone()),
            autosave: AutoSaveCoordinator::new(target, saved, &config.autosave),
            seo,
            score,
            word_count: words,
            closed: false,
        }
    }

    /// Accept the full current text from a producer.
    pub fn deliver(&mut self, text: &str, now: Instant) -> DeliverOutcome {
        if self.closed {
            return DeliverOutcome::Unchanged;
        }
        self.render.deliver(text, now)
    }

    pub fn observe_view_edit(&mut self, now: Instant) -> bool {
        !self.closed && self.render.observe_view_edit(now)
    }

    /// Switch between visual and code editing. A commit flushed by the
    /// switch is forwarded immediately.
    pub fn set_mode(&mut self, mode: ViewMode, now: Instant) -> Vec<SessionEvent> {
        let mut events = Vec::new();
        if let Some(change) = self.render.set_mode(mode) {
            self.apply_commit(change, now, &mut events);
        }
        events
    }

    /// Run due timers.
    pub fn tick(&mut self, now: Instant) -> Vec<SessionEvent> {
        let mut events = Vec::new();
        for event in self.render.tick(now) {
            match event {
                RenderEvent::Committed(change) => self.apply_commit(change, now, &mut events),
                other => events.push(SessionEvent::Render(other)),
            }
        }
        events
    }

    fn apply_commit(&mut self, change: CommittedChange, now: Instant, events: &mut Vec<SessionEvent>) {
        self.word_count = change.word_count;
        self.autosave.observe_content(change.markup.clone(), now);
        events.push(SessionEvent::Render(RenderEvent::Committed(change)));
        self.score = score_breakdown(&self.seo);
        events.push(SessionEvent::Rescored(self.score.clone()));
    }

    /// Replace the SEO inputs. Title, keyword and description are persisted
    /// with the document; related keywords only affect the score.
    pub fn set_seo_inputs(&mut self, inputs: ScoredCandidate, now: Instant) -> &ScoreBreakdown {
        if !self.closed {
            self.autosave.set_metadata(
                inputs.title.clone(),
                inputs.keyword.clone(),
                inputs.description.clone(),
                now,
            );
        }
        self.seo = inputs;
        self.score = score_breakdown(&self.seo);
        &self.score
    }

    pub fn set_featured_image(&mut self, media_id: Option<u64>, now: Instant) {
        if !self.closed {
            self.autosave.set_featured_image(media_id, now);
        }
    }

    pub fn set_categories(&mut self, categories: Vec<u64>, now: Instant) {
        if !self.closed {
            self.autosave.set_categories(categories, now);
        }
    }

    /// Start a save if the auto-save window elapsed.
    pub fn poll_save(&mut self, now: Instant) -> Option<SaveTicket> {
        self.autosave.poll(now)
    }

    pub fn complete_save(
        &mut self,
        ticket: SaveTicket,
        result: Result<StoredDocument, StoreError>,
        now: Instant,
    ) -> AutoSaveStatus {
        self.autosave.complete(ticket, result, now)
    }

    pub async fn save_due<S: DocumentStore>(
        &mut self,
        store: &S,
        now: Instant,
    ) -> Option<Result<StoredDocument, StoreError>> {
        self.autosave.save_due(store, now).await
    }

    /// Save now, bypassing debounces. Any commit still waiting in the render
    /// coordinator is pulled in first.
    pub async fn force_save<S: DocumentStore>(
        &mut self,
        store: &S,
        now: Instant,
    ) -> Option<Result<StoredDocument, StoreError>> {
        if let Some(change) = self.render.flush() {
            let mut events = Vec::new();
            self.apply_commit(change, now, &mut events);
        }
        self.autosave.flush(store, now).await
    }

    /// Tear the session down. Every timer is cancelled and the view is left
    /// alone. Content that had not been committed yet is handed to auto-save.
    ///
    /// Returns whether unsaved changes remain, in which case the caller
    /// should issue a final [`force_save`](Self::force_save).
    pub fn close(&mut self, now: Instant) -> bool {
        if self.closed {
            return self.autosave.has_unsaved_changes();
        }
        self.closed = true;
        if let Some(change) = self.render.teardown() {
            self.word_count = change.word_count;
            self.autosave.observe_content(change.markup, now);
        }
        self.autosave.teardown();
        let unsaved = self.autosave.has_unsaved_changes();
        tracing::debug!(document = %self.autosave.target(), unsaved, "editor session closed");
        unsaved
    }

    /// Earliest instant at which [`tick`](Self::tick) or
    /// [`poll_save`](Self::poll_save) has work to do.
    pub fn next_deadline(&self) -> Option<Instant> {
        match (self.render.next_deadline(), self.autosave.next_deadline()) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        }
    }

    pub fn target(&self) -> &EditingTarget {
        self.autosave.target()
    }

    pub fn score(&self) -> &ScoreBreakdown {
        &self.score
    }

    pub fn seo_inputs(&self) -> &ScoredCandidate {
        &self.seo
    }

    pub fn word_count(&self) -> usize {
        self.word_count
    }

    pub fn save_state(&self) -> AutoSaveState {
        self.autosave.state()
    }

    pub fn save_status(&self) -> AutoSaveStatus {
        self.autosave.status()
    }

    pub fn mode(&self) -> ViewMode {
        self.render.mode()
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    pub fn render(&self) -> &RenderCoordinator<V, R> {
        &self.render
    }

    pub fn view(&self) -> &V {
        self.render.view()
    }

    pub fn view_mut(&mut self) -> &mut V {
        self.render.view_mut()
    }
}

impl<V: ViewSink, R: MarkupRenderer> StreamTarget for EditorSession<V, R> {
    fn receive(&mut self, text: &str, now: Instant) {
        self.deliver(text, now);
    }

    fn progress(&mut self, step: &str, percent: u8) {
        tracing::trace!(document = %self.target(), step, percent, "generation progress");
    }
}
