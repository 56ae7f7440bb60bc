//! Streaming AI generation.
//!
//! Generation services are opaque. All the editor needs from them is a
//! finite, non-restartable stream of [`GenerationEvent`]s: text deltas,
//! optional progress steps and a terminal `Done`. The accumulated text is
//! fed into the render coordinator on every delta.

use std::future::Future;

use n0_future::StreamExt;
use n0_future::boxed::BoxStream;
use resh_common::{GenerationError, ValidationError};
use web_time::Instant;

use crate::normalize::MarkupRenderer;
use crate::render::RenderCoordinator;
use crate::target::TranslationRequest;
use crate::view::ViewSink;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GenerationEvent {
    /// Next piece of text, appended to what came before.
    Delta(String),
    /// Named pipeline step with overall completion in percent.
    Progress { step: String, percent: u8 },
    /// The generator has nothing more to send.
    Done,
}

pub type GenerationStream = BoxStream<Result<GenerationEvent, GenerationError>>;

/// What to generate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GenerationRequest {
    Titles { keyword: String },
    Content { title: String, keyword: String },
    Humanize { content: String },
    Translate(TranslationRequest),
}

impl GenerationRequest {
    pub fn validate(&self) -> Result<(), ValidationError> {
        fn required(value: &str, field: &'static str) -> Result<(), ValidationError> {
            if value.trim().is_empty() {
                return Err(ValidationError::MissingField(field));
            }
            Ok(())
        }

        match self {
            GenerationRequest::Titles { keyword } => required(keyword, "keyword"),
            GenerationRequest::Content { title, keyword } => {
                required(keyword, "keyword")?;
                required(title, "title")
            }
            GenerationRequest::Humanize { content } => required(content, "content"),
            GenerationRequest::Translate(request) => request.validate(),
        }
    }
}

/// A text generation service.
pub trait ContentGenerator {
    fn generate(
        &self,
        request: &GenerationRequest,
    ) -> impl Future<Output = Result<GenerationStream, GenerationError>> + Send;
}

impl<G: ContentGenerator + Sync> ContentGenerator for &G {
    fn generate(
        &self,
        request: &GenerationRequest,
    ) -> impl Future<Output = Result<GenerationStream, GenerationError>> + Send {
        (**self).generate(request)
    }
}

/// Validate `request`, then open a stream on `primary`. If opening fails
/// with a transport error, `fallback` is tried once.
///
/// Validation failures are returned as-is and reach neither generator.
pub async fn generate_with_fallback<P, F>(
    primary: &P,
    fallback: &F,
    request: &GenerationRequest,
) -> Result<GenerationStream, GenerationError>
where
    P: ContentGenerator,
    F: ContentGenerator,
{
    request.validate()?;
    match primary.generate(request).await {
        Ok(stream) => Ok(stream),
        Err(err) if err.allows_fallback() => {
            tracing::warn!(error = %err, "primary generator failed, using fallback");
            fallback.generate(request).await
        }
        Err(err) => Err(err),
    }
}

/// Folds deltas into the full text so far.
#[derive(Debug, Clone, Default)]
pub struct TextAccumulator {
    text: String,
    deltas: usize,
}

impl TextAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append `delta` and return the accumulated text.
    pub fn push(&mut self, delta: &str) -> &str {
        self.text.push_str(delta);
        self.deltas += 1;
        &self.text
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn deltas(&self) -> usize {
        self.deltas
    }

    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }

    pub fn into_string(self) -> String {
        self.text
    }
}

/// Something that accepts accumulated generation output.
pub trait StreamTarget {
    fn receive(&mut self, text: &str, now: Instant);

    fn progress(&mut self, _step: &str, _percent: u8) {}
}

impl<T: StreamTarget + ?Sized> StreamTarget for &mut T {
    fn receive(&mut self, text: &str, now: Instant) {
        (**self).receive(text, now)
    }

    fn progress(&mut self, step: &str, percent: u8) {
        (**self).progress(step, percent)
    }
}

impl<V: ViewSink, R: MarkupRenderer> StreamTarget for RenderCoordinator<V, R> {
    fn receive(&mut self, text: &str, now: Instant) {
        self.deliver(text, now);
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamSummary {
    pub text: String,
    pub deltas: usize,
    /// Whether the generator sent `Done`. A stream that just ends is not an
    /// error, but callers may want to flag truncated output.
    pub finished: bool,
}

/// Drain `stream` into `target`, delivering the full accumulated text after
/// every delta.
///
/// The first error in the stream stops consumption and is returned
/// unchanged; text delivered before it stays in the target.
pub async fn drive_stream<S, T, C>(
    mut stream: S,
    target: &mut T,
    mut clock: C,
) -> Result<StreamSummary, GenerationError>
where
    S: n0_future::Stream<Item = Result<GenerationEvent, GenerationError>> + Unpin,
    T: StreamTarget + ?Sized,
    C: FnMut() -> Instant,
{
    let mut text = TextAccumulator::new();
    let mut finished = false;

    while let Some(event) = stream.next().await {
        match event {
            Ok(GenerationEvent::Delta(delta)) => {
                let now = clock();
                target.receive(text.push(&delta), now);
            }
            Ok(GenerationEvent::Progress { step, percent }) => {
                tracing::debug!(%step, percent, "generation progress");
                target.progress(&step, percent.min(100));
            }
            Ok(GenerationEvent::Done) => {
                finished = true;
                break;
            }
            Err(err) => {
                if err.is_validation() {
                    tracing::error!(error = %err, "generation rejected");
                } else {
                    tracing::warn!(error = %err, deltas = text.deltas(), "generation stream failed");
                }
                return Err(err);
            }
        }
    }

    Ok(StreamSummary {
        deltas: text.deltas(),
        text: text.into_string(),
        finished,
    })
}

/// Stream that yields `events` in order. Used for replaying recorded or
/// chunked output.
pub fn scripted(events: Vec<Result<GenerationEvent, GenerationError>>) -> GenerationStream {
    Box::pin(n0_future::stream::iter(events))
}

/// Split `text` into deltas of at most `chunk_chars` characters, followed by
/// `Done`.
pub fn chunked(text: &str, chunk_chars: usize) -> Vec<GenerationEvent> {
    let chunk_chars = chunk_chars.max(1);
    let chars: Vec<char> = text.chars().collect();
    let mut events: Vec<GenerationEvent> = chars
        .chunks(chunk_chars)
        .map(|chunk| GenerationEvent::Delta(chunk.iter().collect()))
        .collect();
    events.push(GenerationEvent::Done);
    events
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use resh_common::RenderConfig;

    use super::*;
    use crate::target::{DocumentId, LanguageCode};
    use crate::view::MemoryView;

    struct Scripted {
        events: Vec<Result<GenerationEvent, GenerationError>>,
        fail_with: Option<GenerationError>,
        calls: AtomicUsize,
    }

    impl Scripted {
        fn ok(events: Vec<GenerationEvent>) -> Self {
            Self {
                events: events.into_iter().map(Ok).collect(),
                fail_with: None,
                calls: AtomicUsize::new(0),
            }
        }

        fn failing(err: GenerationError) -> Self {
            Self {
                events: Vec::new(),
                fail_with: Some(err),
                calls: AtomicUsize::new(0),
            }
        }
    }

    impl ContentGenerator for Scripted {
        async fn generate(
            &self,
            _request: &GenerationRequest,
        ) -> Result<GenerationStream, GenerationError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match &self.fail_with {
                Some(err) => Err(err.clone()),
                None => Ok(scripted(self.events.clone())),
            }
        }
    }

    #[derive(Default)]
    struct Recorder {
        texts: Vec<String>,
        progress: Vec<(String, u8)>,
    }

    impl StreamTarget for Recorder {
        fn receive(&mut self, text: &str, _now: Instant) {
            self.texts.push(text.to_owned());
        }

        fn progress(&mut self, step: &str, percent: u8) {
            self.progress.push((step.to_owned(), percent));
        }
    }

    fn titles() -> GenerationRequest {
        GenerationRequest::Titles {
            keyword: "pantanal".into(),
        }
    }

    #[test]
    fn chunking_respects_char_boundaries() {
        let events = chunked("añob", 2);
        assert_eq!(
            events,
            vec![
                GenerationEvent::Delta("añ".into()),
                GenerationEvent::Delta("ob".into()),
                GenerationEvent::Done,
            ]
        );
        assert_eq!(chunked("", 3), vec![GenerationEvent::Done]);
    }

    #[tokio::test]
    async fn deltas_are_delivered_accumulated() {
        let mut target = Recorder::default();
        let stream = scripted(vec![
            Ok(GenerationEvent::Progress {
                step: "drafting".into(),
                percent: 10,
            }),
            Ok(GenerationEvent::Delta("Hel".into())),
            Ok(GenerationEvent::Delta("lo".into())),
            Ok(GenerationEvent::Done),
            Ok(GenerationEvent::Delta("ignored".into())),
        ]);

        let summary = drive_stream(stream, &mut target, Instant::now).await.unwrap();
        assert_eq!(target.texts, vec!["Hel", "Hello"]);
        assert_eq!(target.progress, vec![("drafting".to_owned(), 10)]);
        assert_eq!(summary.text, "Hello");
        assert_eq!(summary.deltas, 2);
        assert!(summary.finished);
    }

    #[tokio::test]
    async fn stream_errors_stop_consumption() {
        let mut target = Recorder::default();
        let stream = scripted(vec![
            Ok(GenerationEvent::Delta("partial".into())),
            Err(GenerationError::Transport("reset".into())),
            Ok(GenerationEvent::Delta(" more".into())),
        ]);
        let err = drive_stream(stream, &mut target, Instant::now)
            .await
            .unwrap_err();
        assert_eq!(err, GenerationError::Transport("reset".into()));
        assert_eq!(target.texts, vec!["partial"]);
    }

    #[tokio::test]
    async fn streaming_into_render_coordinator() {
        let t0 = Instant::now();
        let mut tick = 0;
        let clock = || {
            tick += 1;
            t0 + Duration::from_millis(tick * 40)
        };
        let mut render = RenderCoordinator::new(MemoryView::new(), RenderConfig::default());
        let stream = scripted(chunked("Hello world", 4).into_iter().map(Ok).collect());
        drive_stream(stream, &mut render, clock).await.unwrap();

        assert_eq!(render.buffer().raw_text, "Hello world");
        assert!(render.buffer().cursor_visible);
        let change = render.flush().unwrap();
        assert_eq!(change.markup, "<p>Hello world</p>");
    }

    #[tokio::test]
    async fn transport_failure_uses_fallback() {
        let primary = Scripted::failing(GenerationError::Transport("timeout".into()));
        let fallback = Scripted::ok(vec![GenerationEvent::Delta("ok".into())]);

        let stream = generate_with_fallback(&primary, &fallback, &titles())
            .await
            .unwrap();
        let mut target = Recorder::default();
        drive_stream(stream, &mut target, Instant::now).await.unwrap();
        assert_eq!(target.texts, vec!["ok"]);
        assert_eq!(fallback.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn validation_failure_never_falls_back() {
        let primary = Scripted::ok(vec![]);
        let fallback = Scripted::ok(vec![]);
        let request = GenerationRequest::Translate(TranslationRequest {
            document: DocumentId::new("doc").unwrap(),
            language: LanguageCode::new("es").unwrap(),
            title: "Title".into(),
            content: "<p>Body</p>".into(),
            keyword: None,
        });

        let err = generate_with_fallback(&primary, &fallback, &request)
            .await
            .err()
            .unwrap();
        assert!(err.is_validation());
        assert_eq!(primary.calls.load(Ordering::SeqCst), 0);
        assert_eq!(fallback.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn provider_validation_error_is_not_retried() {
        let primary = Scripted::failing(ValidationError::MissingField("keyword").into());
        let fallback = Scripted::ok(vec![]);
        let err = generate_with_fallback(&primary, &fallback, &titles())
            .await
            .err()
            .unwrap();
        assert_eq!(
            err,
            GenerationError::from(ValidationError::MissingField("keyword"))
        );
        assert_eq!(fallback.calls.load(Ordering::SeqCst), 0);
    }
}
