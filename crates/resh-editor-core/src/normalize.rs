//! Content normalisation: turn whatever a producer hands us into markup.
//!
//! Text arriving from AI generation may already be HTML, may be Markdown, or
//! may be bare prose. [`normalize`] picks the right treatment for each call;
//! nothing is memoised between calls.

use std::sync::LazyLock;

use markdown_weaver::{CodeBlockKind, Event, Options, Parser, Tag, TagEnd};
use markdown_weaver_escape::{
    FmtWriter, StrWrite, escape_href, escape_html, escape_html_body_text,
};
use regex::Regex;

/// Structural tags that mark text as already rendered.
static STRUCTURAL_TAG_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)<(p|h[1-6]|div|ul|ol|li|blockquote|pre|table|figure|img|br|hr|section|article)[\s/>]",
    )
    .unwrap()
});

/// Lightweight formatting syntax worth running through the Markdown parser.
static MARKDOWN_SYNTAX_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(concat!(
        r"(?m)^(#{1,6}\s|\s*[-*+]\s+\S|\s*\d+[.)]\s+\S|>\s?|```|~~~)",
        r"|\*\*[^*\n]+\*\*|__[^_\n]+__|\[[^\]\n]+\]\([^)\n]+\)|`[^`\n]+`",
    ))
    .unwrap()
});

static TAG_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"<[^>]*>").unwrap());

/// What kind of text a producer delivered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentKind {
    /// Already rendered markup; passed through untouched.
    Markup,
    /// Lightweight formatting syntax that needs rendering.
    Markdown,
    /// Neither; wrapped as a single block.
    Plain,
}

/// Classify `text`. Markup wins over Markdown when both are present.
pub fn detect(text: &str) -> ContentKind {
    if STRUCTURAL_TAG_RE.is_match(text) {
        ContentKind::Markup
    } else if MARKDOWN_SYNTAX_RE.is_match(text) {
        ContentKind::Markdown
    } else {
        ContentKind::Plain
    }
}

#[derive(thiserror::Error, Debug, miette::Diagnostic, Clone, PartialEq, Eq)]
pub enum NormalizeError {
    #[error("failed to write rendered markup")]
    #[diagnostic(code(resh::normalize::write))]
    Write,

    #[error("rendered markup left {0} tag(s) open")]
    #[diagnostic(code(resh::normalize::unbalanced))]
    Unbalanced(usize),
}

impl From<std::fmt::Error> for NormalizeError {
    fn from(_: std::fmt::Error) -> Self {
        NormalizeError::Write
    }
}

/// Renders lightweight formatting syntax into markup.
///
/// The default is [`MarkdownRenderer`]; other implementations exist mostly
/// for testing the fallback path.
pub trait MarkupRenderer {
    fn render(&self, source: &str) -> Result<String, NormalizeError>;
}

impl<T: MarkupRenderer> MarkupRenderer for &T {
    fn render(&self, source: &str) -> Result<String, NormalizeError> {
        (*self).render(source)
    }
}

/// Markdown → HTML using markdown-weaver's parser.
#[derive(Debug, Clone, Copy, Default)]
pub struct MarkdownRenderer;

pub fn default_md_options() -> Options {
    Options::ENABLE_TABLES | Options::ENABLE_STRIKETHROUGH | Options::ENABLE_GFM
}

impl MarkupRenderer for MarkdownRenderer {
    fn render(&self, source: &str) -> Result<String, NormalizeError> {
        let mut out = String::with_capacity(source.len() + source.len() / 4);
        let parser = Parser::new_ext(source, default_md_options());
        let open = HtmlWriter::new(parser, FmtWriter(&mut out)).run()?;
        if open != 0 {
            return Err(NormalizeError::Unbalanced(open));
        }
        let trimmed = out.trim_end().len();
        out.truncate(trimmed);
        Ok(out)
    }
}

/// Normalise with the default Markdown renderer.
pub fn normalize(text: &str) -> String {
    normalize_with(text, &MarkdownRenderer)
}

/// Normalise `text` into markup.
///
/// Never fails: if the renderer errors, the input is passed through as if it
/// were already markup and a warning is logged.
pub fn normalize_with<R: MarkupRenderer>(text: &str, renderer: &R) -> String {
    match detect(text) {
        ContentKind::Markup => text.to_owned(),
        ContentKind::Markdown => match renderer.render(text) {
            Ok(html) => html,
            Err(e) => {
                tracing::warn!(error = %e, chars = text.chars().count(), "markdown render failed, passing through");
                text.to_owned()
            }
        },
        ContentKind::Plain => wrap_plain(text),
    }
}

/// Wrap bare prose in a single paragraph. Line breaks are kept as `<br />`.
fn wrap_plain(text: &str) -> String {
    let text = text.trim_end();
    if text.is_empty() {
        return String::new();
    }
    let mut out = String::with_capacity(text.len() + 8);
    out.push_str("<p>");
    let mut writer = FmtWriter(&mut out);
    for (i, line) in text.split('\n').enumerate() {
        if i > 0 {
            // fmt::Write into a String cannot fail
            let _ = writer.write_str("<br />");
        }
        let _ = escape_html_body_text(&mut writer, line.trim_end_matches('\r'));
    }
    out.push_str("</p>");
    out
}

/// Strip tags and decode the common entities, for counting and scoring.
pub fn plain_text(markup: &str) -> String {
    let stripped = TAG_RE.replace_all(markup, " ");
    stripped
        .replace("&nbsp;", " ")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&amp;", "&")
}

/// Whitespace-delimited word count of the visible text in `markup`.
pub fn word_count(markup: &str) -> usize {
    plain_text(markup).split_whitespace().count()
}

struct HtmlWriter<'a, I, W> {
    iter: I,
    writer: W,
    /// Whether the last write ended with a newline.
    end_newline: bool,
    /// Open block/inline tags; nonzero at the end means the event stream was
    /// malformed.
    depth: usize,
    in_table_head: bool,
    _events: std::marker::PhantomData<Event<'a>>,
}

impl<'a, I, W> HtmlWriter<'a, I, W>
where
    I: Iterator<Item = Event<'a>>,
    W: StrWrite,
{
    fn new(iter: I, writer: W) -> Self {
        Self {
            iter,
            writer,
            end_newline: true,
            depth: 0,
            in_table_head: false,
            _events: std::marker::PhantomData,
        }
    }

    #[inline]
    fn write(&mut self, s: &str) -> Result<(), W::Error> {
        self.writer.write_str(s)?;
        if !s.is_empty() {
            self.end_newline = s.ends_with('\n');
        }
        Ok(())
    }

    /// Start a block element on its own line.
    fn block(&mut self, s: &str) -> Result<(), W::Error> {
        if !self.end_newline {
            self.write("\n")?;
        }
        self.write(s)
    }

    /// Returns the number of tags still open when the events ran out.
    fn run(mut self) -> Result<usize, W::Error> {
        while let Some(event) = self.iter.next() {
            match event {
                Event::Start(tag) => {
                    self.depth += 1;
                    self.start_tag(tag)?;
                }
                Event::End(tag) => {
                    self.depth = self.depth.saturating_sub(1);
                    self.end_tag(tag)?;
                }
                Event::Text(text) => {
                    escape_html_body_text(&mut self.writer, &text)?;
                    self.end_newline = text.ends_with('\n');
                }
                Event::Code(text) => {
                    self.write("<code>")?;
                    escape_html_body_text(&mut self.writer, &text)?;
                    self.write("</code>")?;
                }
                Event::Html(html) | Event::InlineHtml(html) => {
                    self.write(&html)?;
                }
                Event::SoftBreak => self.write("\n")?,
                Event::HardBreak => self.write("<br />\n")?,
                Event::Rule => self.block("<hr />\n")?,
                Event::TaskListMarker(true) => {
                    self.write("<input disabled=\"\" type=\"checkbox\" checked=\"\"/>\n")?
                }
                Event::TaskListMarker(false) => {
                    self.write("<input disabled=\"\" type=\"checkbox\"/>\n")?
                }
                // Math, footnotes and weaver extensions are not enabled.
                _ => {}
            }
        }
        Ok(self.depth)
    }

    fn start_tag(&mut self, tag: Tag<'a>) -> Result<(), W::Error> {
        match tag {
            Tag::Paragraph => self.block("<p>"),
            Tag::Heading { level, .. } => {
                self.block("<")?;
                write!(&mut self.writer, "{}", level)?;
                self.write(">")
            }
            Tag::BlockQuote(_) => self.block("<blockquote>\n"),
            Tag::CodeBlock(kind) => {
                let lang = match &kind {
                    CodeBlockKind::Fenced(info) => info.split(' ').next().unwrap_or(""),
                    CodeBlockKind::Indented => "",
                };
                if lang.is_empty() {
                    self.block("<pre><code>")
                } else {
                    self.block("<pre><code class=\"language-")?;
                    escape_html(&mut self.writer, lang)?;
                    self.write("\">")
                }
            }
            Tag::List(Some(1)) => self.block("<ol>\n"),
            Tag::List(Some(start)) => {
                self.block("<ol start=\"")?;
                write!(&mut self.writer, "{}", start)?;
                self.write("\">\n")
            }
            Tag::List(None) => self.block("<ul>\n"),
            Tag::Item => self.block("<li>"),
            Tag::Table(_) => self.block("<table>"),
            Tag::TableHead => {
                self.in_table_head = true;
                self.write("<thead><tr>")
            }
            Tag::TableRow => self.write("<tr>"),
            Tag::TableCell => {
                if self.in_table_head {
                    self.write("<th>")
                } else {
                    self.write("<td>")
                }
            }
            Tag::Emphasis => self.write("<em>"),
            Tag::Strong => self.write("<strong>"),
            Tag::Strikethrough => self.write("<del>"),
            Tag::Link {
                dest_url, title, ..
            } => {
                self.write("<a href=\"")?;
                escape_href(&mut self.writer, &dest_url)?;
                if !title.is_empty() {
                    self.write("\" title=\"")?;
                    escape_html(&mut self.writer, &title)?;
                }
                self.write("\">")
            }
            Tag::Image {
                dest_url, title, ..
            } => {
                self.write("<img src=\"")?;
                escape_href(&mut self.writer, &dest_url)?;
                self.write("\" alt=\"")?;
                self.alt_text()?;
                if !title.is_empty() {
                    self.write("\" title=\"")?;
                    escape_html(&mut self.writer, &title)?;
                }
                // alt_text consumed the matching end tag
                self.depth = self.depth.saturating_sub(1);
                self.write("\" />")
            }
            _ => Ok(()),
        }
    }

    fn end_tag(&mut self, tag: TagEnd) -> Result<(), W::Error> {
        match tag {
            TagEnd::Paragraph => self.write("</p>\n"),
            TagEnd::Heading(level) => {
                self.write("</")?;
                write!(&mut self.writer, "{}", level)?;
                self.write(">\n")
            }
            TagEnd::BlockQuote(_) => self.write("</blockquote>\n"),
            TagEnd::CodeBlock => self.write("</code></pre>\n"),
            TagEnd::List(true) => self.write("</ol>\n"),
            TagEnd::List(false) => self.write("</ul>\n"),
            TagEnd::Item => self.write("</li>\n"),
            TagEnd::Table => self.write("</tbody></table>\n"),
            TagEnd::TableHead => {
                self.in_table_head = false;
                self.write("</tr></thead><tbody>\n")
            }
            TagEnd::TableRow => self.write("</tr>\n"),
            TagEnd::TableCell => {
                if self.in_table_head {
                    self.write("</th>")
                } else {
                    self.write("</td>")
                }
            }
            TagEnd::Emphasis => self.write("</em>"),
            TagEnd::Strong => self.write("</strong>"),
            TagEnd::Strikethrough => self.write("</del>"),
            TagEnd::Link => self.write("</a>"),
            _ => Ok(()),
        }
    }

    /// Write the text of an image's children as its alt attribute, consuming
    /// events up to and including the image's end tag.
    fn alt_text(&mut self) -> Result<(), W::Error> {
        let mut nest = 0;
        while let Some(event) = self.iter.next() {
            match event {
                Event::Start(_) => nest += 1,
                Event::End(_) => {
                    if nest == 0 {
                        break;
                    }
                    nest -= 1;
                }
                Event::Text(text) | Event::Code(text) | Event::InlineHtml(text) => {
                    escape_html(&mut self.writer, &text)?;
                }
                Event::SoftBreak | Event::HardBreak => self.write(" ")?,
                _ => {}
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FailingRenderer;

    impl MarkupRenderer for FailingRenderer {
        fn render(&self, _source: &str) -> Result<String, NormalizeError> {
            Err(NormalizeError::Unbalanced(1))
        }
    }

    #[test]
    fn detects_markup() {
        assert_eq!(detect("<p>hello</p>"), ContentKind::Markup);
        assert_eq!(detect("<H2>Title</H2>"), ContentKind::Markup);
        assert_eq!(detect("line<br/>break"), ContentKind::Markup);
        // inline tags alone are not structural
        assert_eq!(detect("<strong>bold</strong> text"), ContentKind::Plain);
    }

    #[test]
    fn detects_markdown() {
        assert_eq!(detect("# Heading"), ContentKind::Markdown);
        assert_eq!(detect("intro\n\n- one\n- two"), ContentKind::Markdown);
        assert_eq!(detect("some **bold** words"), ContentKind::Markdown);
        assert_eq!(detect("see [docs](https://example.com)"), ContentKind::Markdown);
        assert_eq!(detect("1. first"), ContentKind::Markdown);
    }

    #[test]
    fn detects_plain() {
        assert_eq!(detect("Hello world"), ContentKind::Plain);
        assert_eq!(detect("2 * 3 = 6"), ContentKind::Plain);
        assert_eq!(detect("an unfinished **bold"), ContentKind::Plain);
    }

    #[test]
    fn markup_passes_through() {
        let html = "<h2>Title</h2><p>Body &amp; more</p>";
        assert_eq!(normalize(html), html);
    }

    #[test]
    fn plain_text_is_wrapped_and_escaped() {
        insta::assert_snapshot!(normalize("Hello world"), @"<p>Hello world</p>");
        assert_eq!(normalize("a < b\nc & d"), "<p>a &lt; b<br />c &amp; d</p>");
        assert_eq!(normalize(""), "");
    }

    #[test]
    fn markdown_heading_and_paragraph() {
        insta::assert_snapshot!(
            normalize("# Title\n\nSome **bold** text"),
            @r"
        <h1>Title</h1>
        <p>Some <strong>bold</strong> text</p>
        "
        );
    }

    #[test]
    fn markdown_lists() {
        let html = normalize("- one\n- two");
        assert_eq!(html, "<ul>\n<li>one</li>\n<li>two</li>\n</ul>");
    }

    #[test]
    fn markdown_links_are_escaped() {
        let html = normalize("see [docs](https://example.com/?a=1&b=2)");
        assert!(html.contains("<a href=\"https://example.com/?a=1&amp;b=2\">docs</a>"));
    }

    #[test]
    fn renderer_failure_falls_back_to_passthrough() {
        let text = "# Heading that will not render";
        assert_eq!(normalize_with(text, &FailingRenderer), text);
    }

    #[test]
    fn renderer_is_not_consulted_for_plain_or_markup() {
        assert_eq!(normalize_with("plain words", &FailingRenderer), "<p>plain words</p>");
        assert_eq!(normalize_with("<p>x</p>", &FailingRenderer), "<p>x</p>");
    }

    #[test]
    fn normalisation_is_deterministic() {
        let text = "## Plan\n\n1. research\n2. write";
        assert_eq!(normalize(text), normalize(text));
    }

    #[test]
    fn plain_text_and_word_count() {
        let markup = "<h1>Best&nbsp;time</h1>\n<p>to visit <strong>Pantanal</strong> &amp; more</p>";
        assert_eq!(word_count(markup), 7);
        assert!(plain_text(markup).contains("Pantanal"));
        assert!(plain_text(markup).contains('&'));
        assert_eq!(word_count(""), 0);
    }
}
