//! Incremental render coordinator.
//!
//! Reconciles a possibly-streaming source of text with a [`ViewSink`]. Every
//! delivery carries the full current text; the coordinator normalises it,
//! diffs against what the view shows (ignoring the cursor marker), and only
//! writes when something changed.
//!
//! Growing text (the streaming case) gets a short fade and a trailing cursor
//! marker that is cleared once deliveries go quiet. Any other change is
//! written directly. Committed-change notifications are debounced and always
//! carry the latest, cursor-free content.
//!
//! All timing is driven by [`RenderCoordinator::tick`] with caller-supplied
//! instants; nothing here sleeps or spawns.

use resh_common::RenderConfig;
use web_time::Instant;

use crate::normalize::{MarkdownRenderer, MarkupRenderer, normalize_with, word_count};
use crate::timer::TimerRegistry;
use crate::view::ViewSink;

/// How deliveries reach the view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ViewMode {
    /// Normalised, diffed, decorated.
    #[default]
    Visual,
    /// Raw source editing: 1:1 passthrough, no normalisation or diffing.
    Code,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RenderTimer {
    FadeEnd,
    CursorIdle,
    Commit,
}

/// The logical content behind the view.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RenderBuffer {
    /// Latest text delivered by the producer, before normalisation.
    pub raw_text: String,
    /// Clean text last written into the view.
    pub last_rendered_text: String,
    /// Whether the view currently carries the cursor marker.
    pub cursor_visible: bool,
}

/// A content update that survived the commit debounce.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommittedChange {
    /// Text as the producer delivered it.
    pub raw: String,
    /// Cursor-free markup as written into the view.
    pub markup: String,
    pub word_count: usize,
}

impl CommittedChange {
    fn new(raw: String, markup: String) -> Self {
        let word_count = word_count(&markup);
        Self {
            raw,
            markup,
            word_count,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RenderEvent {
    /// The fade after a growing write finished.
    OpacityRestored,
    /// The cursor marker was removed after the idle window.
    CursorCleared,
    Committed(CommittedChange),
}

/// What a single [`RenderCoordinator::deliver`] call did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliverOutcome {
    /// Content matched the view; nothing was written.
    Unchanged,
    /// Text grew: written with fade and cursor.
    Grew,
    /// Text shrank or changed in place: written directly.
    Replaced,
    /// Code mode: written verbatim.
    Passthrough,
}

pub struct RenderCoordinator<V, R = MarkdownRenderer> {
    view: V,
    renderer: R,
    config: RenderConfig,
    buffer: RenderBuffer,
    mode: ViewMode,
    timers: TimerRegistry<RenderTimer>,
    pending_commit: Option<CommittedChange>,
}

impl<V: ViewSink> RenderCoordinator<V, MarkdownRenderer> {
    pub fn new(view: V, config: RenderConfig) -> Self {
        Self::with_renderer(view, MarkdownRenderer, config)
    }
}

impl<V: ViewSink, R: MarkupRenderer> RenderCoordinator<V, R> {
    pub fn with_renderer(view: V, renderer: R, config: RenderConfig) -> Self {
        let mut coordinator = Self {
            view,
            renderer,
            config,
            buffer: RenderBuffer::default(),
            mode: ViewMode::Visual,
            timers: TimerRegistry::new(),
            pending_commit: None,
        };
        let existing = coordinator.clean_view_text();
        coordinator.buffer.raw_text = existing.clone();
        coordinator.buffer.last_rendered_text = existing;
        coordinator
    }

    /// Accept the producer's full current text.
    pub fn deliver(&mut self, text: &str, now: Instant) -> DeliverOutcome {
        match self.mode {
            ViewMode::Code => self.deliver_code(text, now),
            ViewMode::Visual => self.deliver_visual(text, now),
        }
    }

    fn deliver_visual(&mut self, text: &str, now: Instant) -> DeliverOutcome {
        let markup = normalize_with(text, &self.renderer);
        let current = self.clean_view_text();
        self.buffer.raw_text = text.to_owned();

        if markup == current {
            if let Some(pending) = self.pending_commit.as_mut() {
                pending.raw = text.to_owned();
            }
            return DeliverOutcome::Unchanged;
        }

        let near_bottom = self.view.is_near_bottom(self.config.near_bottom_px);
        let outcome = if markup.chars().count() > current.chars().count() {
            self.view.set_opacity(self.config.fade_opacity);
            let mut decorated = String::with_capacity(markup.len() + self.config.cursor_marker.len());
            decorated.push_str(&markup);
            decorated.push_str(&self.config.cursor_marker);
            self.view.set_text(&decorated);
            self.buffer.cursor_visible = true;
            self.timers
                .schedule_after(RenderTimer::FadeEnd, now, self.config.fade());
            self.timers
                .schedule_after(RenderTimer::CursorIdle, now, self.config.cursor_idle());
            DeliverOutcome::Grew
        } else {
            self.view.set_text(&markup);
            self.buffer.cursor_visible = false;
            self.timers.cancel(RenderTimer::CursorIdle);
            DeliverOutcome::Replaced
        };

        if near_bottom {
            self.view.scroll_to_bottom();
        }

        tracing::trace!(?outcome, chars = markup.len(), near_bottom, "view updated");
        self.buffer.last_rendered_text = markup.clone();
        self.schedule_commit(CommittedChange::new(text.to_owned(), markup), now);
        outcome
    }

    fn deliver_code(&mut self, text: &str, now: Instant) -> DeliverOutcome {
        self.view.set_text(text);
        self.buffer.raw_text = text.to_owned();
        self.buffer.last_rendered_text = text.to_owned();
        self.buffer.cursor_visible = false;
        self.timers.cancel(RenderTimer::CursorIdle);
        self.schedule_commit(CommittedChange::new(text.to_owned(), text.to_owned()), now);
        DeliverOutcome::Passthrough
    }

    /// Pick up an edit typed directly into the view. Returns whether the
    /// clean content changed.
    pub fn observe_view_edit(&mut self, now: Instant) -> bool {
        let clean = self.clean_view_text();
        if clean == self.buffer.last_rendered_text {
            return false;
        }
        self.buffer.raw_text = clean.clone();
        self.buffer.last_rendered_text = clean.clone();
        self.schedule_commit(CommittedChange::new(clean.clone(), clean), now);
        true
    }

    fn schedule_commit(&mut self, change: CommittedChange, now: Instant) {
        self.pending_commit = Some(change);
        self.timers
            .schedule_after(RenderTimer::Commit, now, self.config.commit_debounce());
    }

    /// Run every timer due at `now`.
    pub fn tick(&mut self, now: Instant) -> Vec<RenderEvent> {
        let mut events = Vec::new();
        for timer in self.timers.fire_due(now) {
            match timer {
                RenderTimer::FadeEnd => {
                    self.view.set_opacity(1.0);
                    events.push(RenderEvent::OpacityRestored);
                }
                RenderTimer::CursorIdle => {
                    if self.buffer.cursor_visible {
                        let clean = self.clean_view_text();
                        self.view.set_text(&clean);
                        self.buffer.cursor_visible = false;
                        events.push(RenderEvent::CursorCleared);
                    }
                }
                RenderTimer::Commit => {
                    if let Some(change) = self.pending_commit.take() {
                        tracing::debug!(words = change.word_count, "content committed");
                        events.push(RenderEvent::Committed(change));
                    }
                }
            }
        }
        events
    }

    /// Switch view mode. Any pending commit is flushed first and returned so
    /// the caller can forward it; the cursor marker is removed.
    pub fn set_mode(&mut self, mode: ViewMode) -> Option<CommittedChange> {
        if mode == self.mode {
            return None;
        }
        let flushed = self.flush();
        self.clear_cursor();
        self.mode = mode;
        self.buffer.last_rendered_text = self.clean_view_text();
        tracing::debug!(?mode, flushed = flushed.is_some(), "view mode switched");
        flushed
    }

    /// Emit the pending commit now instead of waiting out the debounce.
    pub fn flush(&mut self) -> Option<CommittedChange> {
        self.timers.cancel(RenderTimer::Commit);
        self.pending_commit.take()
    }

    /// Strip the cursor, restore full opacity and cancel all timers. Returns
    /// the commit that had not fired yet, if any.
    pub fn teardown(&mut self) -> Option<CommittedChange> {
        let pending = self.pending_commit.take();
        self.clear_cursor();
        if self.timers.is_scheduled(RenderTimer::FadeEnd) {
            self.view.set_opacity(1.0);
        }
        let cancelled = self.timers.cancel_all();
        tracing::debug!(cancelled, "render coordinator torn down");
        pending
    }

    fn clear_cursor(&mut self) {
        self.timers.cancel(RenderTimer::CursorIdle);
        if self.buffer.cursor_visible {
            let clean = self.clean_view_text();
            self.view.set_text(&clean);
            self.buffer.cursor_visible = false;
        }
    }

    /// The view's text with any cursor marker removed.
    pub fn clean_view_text(&self) -> String {
        strip_cursor(&self.view.text(), &self.config.cursor_marker)
    }

    pub fn next_deadline(&self) -> Option<Instant> {
        self.timers.next_deadline()
    }

    pub fn has_pending_commit(&self) -> bool {
        self.pending_commit.is_some()
    }

    pub fn buffer(&self) -> &RenderBuffer {
        &self.buffer
    }

    pub fn mode(&self) -> ViewMode {
        self.mode
    }

    pub fn config(&self) -> &RenderConfig {
        &self.config
    }

    pub fn view(&self) -> &V {
        &self.view
    }

    pub fn view_mut(&mut self) -> &mut V {
        &mut self.view
    }

    pub fn into_view(self) -> V {
        self.view
    }
}

/// Remove every occurrence of the cursor marker.
pub fn strip_cursor(text: &str, marker: &str) -> String {
    if marker.is_empty() {
        return text.to_owned();
    }
    text.replace(marker, "")
}
