//! View sink abstraction.
//!
//! The render coordinator never touches a rendering surface directly. The
//! browser layer implements [`ViewSink`] over the editor element; tests and
//! the CLI use [`MemoryView`].

/// The minimal surface the render coordinator writes into.
pub trait ViewSink {
    /// Current rendered text, possibly including a transient cursor marker.
    fn text(&self) -> String;

    /// Replace the rendered text.
    fn set_text(&mut self, text: &str);

    /// Whether the scroll container is within `threshold_px` of its bottom.
    fn is_near_bottom(&self, threshold_px: f64) -> bool;

    /// Scroll the container to its bottom (smoothly, where supported).
    fn scroll_to_bottom(&mut self);

    /// Set the view's opacity. Surfaces without transitions ignore this.
    fn set_opacity(&mut self, _opacity: f32) {}
}

impl<V: ViewSink + ?Sized> ViewSink for &mut V {
    fn text(&self) -> String {
        (**self).text()
    }

    fn set_text(&mut self, text: &str) {
        (**self).set_text(text)
    }

    fn is_near_bottom(&self, threshold_px: f64) -> bool {
        (**self).is_near_bottom(threshold_px)
    }

    fn scroll_to_bottom(&mut self) {
        (**self).scroll_to_bottom()
    }

    fn set_opacity(&mut self, opacity: f32) {
        (**self).set_opacity(opacity)
    }
}

impl<V: ViewSink + ?Sized> ViewSink for Box<V> {
    fn text(&self) -> String {
        (**self).text()
    }

    fn set_text(&mut self, text: &str) {
        (**self).set_text(text)
    }

    fn is_near_bottom(&self, threshold_px: f64) -> bool {
        (**self).is_near_bottom(threshold_px)
    }

    fn scroll_to_bottom(&mut self) {
        (**self).scroll_to_bottom()
    }

    fn set_opacity(&mut self, opacity: f32) {
        (**self).set_opacity(opacity)
    }
}

/// In-memory view that records every interaction.
///
/// Scroll position is simulated as a distance from the bottom, in pixels.
#[derive(Debug, Clone, PartialEq)]
pub struct MemoryView {
    text: String,
    distance_from_bottom: f64,
    opacity: f32,
    writes: usize,
    scrolls: usize,
}

impl Default for MemoryView {
    fn default() -> Self {
        Self {
            text: String::new(),
            distance_from_bottom: 0.0,
            opacity: 1.0,
            writes: 0,
            scrolls: 0,
        }
    }
}

impl MemoryView {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ..Self::default()
        }
    }

    /// Simulate the user scrolling `px` pixels above the bottom.
    pub fn scroll_up_to(&mut self, px: f64) {
        self.distance_from_bottom = px.max(0.0);
    }

    /// Simulate the user typing directly into the view.
    pub fn type_text(&mut self, text: impl Into<String>) {
        self.text = text.into();
    }

    pub fn distance_from_bottom(&self) -> f64 {
        self.distance_from_bottom
    }

    pub fn opacity(&self) -> f32 {
        self.opacity
    }

    /// Number of `set_text` calls so far.
    pub fn writes(&self) -> usize {
        self.writes
    }

    /// Number of `scroll_to_bottom` calls so far.
    pub fn scrolls(&self) -> usize {
        self.scrolls
    }

    pub fn as_str(&self) -> &str {
        &self.text
    }
}

impl ViewSink for MemoryView {
    fn text(&self) -> String {
        self.text.clone()
    }

    fn set_text(&mut self, text: &str) {
        self.writes += 1;
        self.text.clear();
        self.text.push_str(text);
    }

    fn is_near_bottom(&self, threshold_px: f64) -> bool {
        self.distance_from_bottom <= threshold_px
    }

    fn scroll_to_bottom(&mut self) {
        self.scrolls += 1;
        self.distance_from_bottom = 0.0;
    }

    fn set_opacity(&mut self, opacity: f32) {
        self.opacity = opacity;
    }
}
