//! resh-editor-core: framework-free editor logic for SEO article editing.
//!
//! This crate provides:
//! - `seo` - deterministic SEO scoring of title/description candidates
//! - `RenderCoordinator` - incremental, diffing view updates with a typing
//!   cursor and debounced commits
//! - `AutoSaveCoordinator` - debounced, single-flight persistence
//! - `EditorSession` - the two coordinators wired together for one document
//!
//! Nothing here owns a clock or spawns tasks. Callers pass `Instant`s in and
//! drive timers with `tick`/`poll`, which keeps everything deterministic.

pub mod autosave;
pub mod media;
pub mod normalize;
pub mod render;
pub mod seo;
pub mod session;
pub mod store;
pub mod stream;
pub mod target;
pub mod timer;
pub mod view;

pub use autosave::{AutoSaveCoordinator, AutoSaveState, AutoSaveStatus, Draft, SaveTicket};
pub use media::{MediaItem, MediaLibrary, MediaPage, MediaQuery, MediaSearch};
pub use normalize::{ContentKind, MarkdownRenderer, MarkupRenderer, NormalizeError, normalize};
pub use render::{
    CommittedChange, DeliverOutcome, RenderBuffer, RenderCoordinator, RenderEvent, ViewMode,
};
pub use resh_common::{EditorConfig, GenerationError, StoreError, ValidationError};
pub use seo::{ScoreBand, ScoreBreakdown, ScoredCandidate, score, score_breakdown};
pub use session::{EditorSession, SessionEvent};
pub use smol_str::SmolStr;
pub use store::{DocumentPatch, DocumentStore, MemoryStore, StoredDocument};
pub use stream::{
    ContentGenerator, GenerationEvent, GenerationRequest, GenerationStream, TextAccumulator,
    drive_stream,
};
pub use target::{DocumentId, EditingTarget, LanguageCode, TranslationRequest};
pub use timer::{TimerHandle, TimerRegistry};
pub use view::{MemoryView, ViewSink};
