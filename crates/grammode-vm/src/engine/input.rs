//! Text the matcher runs against.

use std::cell::OnceCell;

/// Host access to the lines after the current one.
pub trait LineSource {
    /// The `n`th line after the current one, starting at 1.
    fn look_ahead(&self, n: usize) -> Option<&str>;
}

/// Following lines as a slice, first element = next line.
impl LineSource for [&str] {
    fn look_ahead(&self, n: usize) -> Option<&str> {
        n.checked_sub(1).and_then(|i| self.get(i)).copied()
    }
}

impl LineSource for [String] {
    fn look_ahead(&self, n: usize) -> Option<&str> {
        n.checked_sub(1)
            .and_then(|i| self.get(i))
            .map(String::as_str)
    }
}

/// A line source for the end of the document.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoLookahead;

impl LineSource for NoLookahead {
    fn look_ahead(&self, _n: usize) -> Option<&str> {
        None
    }
}

/// The rest of one line, terminated by a newline.
///
/// Lookaheads see a wider window that appends following lines. It is built
/// on first use since most tokens never look past their line.
pub(crate) struct MatchInput<'i> {
    line: &'i str,
    offset: usize,
    text: String,
    /// `LineSource::look_ahead` of the host's source.
    lines: &'i dyn Fn(usize) -> Option<&'i str>,
    max_lines: usize,
    window: OnceCell<String>,
}

impl<'i> MatchInput<'i> {
    pub(crate) fn new(
        line: &'i str,
        offset: usize,
        lines: &'i dyn Fn(usize) -> Option<&'i str>,
        max_lines: usize,
    ) -> Self {
        let mut text = line.get(offset..).unwrap_or_default().to_string();
        text.push('\n');
        Self {
            line,
            offset,
            text,
            lines,
            max_lines,
            window: OnceCell::new(),
        }
    }

    /// Full current line, for predicates.
    pub(crate) fn line(&self) -> &'i str {
        self.line
    }

    /// Byte offset of `text()` within `line()`.
    pub(crate) fn offset(&self) -> usize {
        self.offset
    }

    pub(crate) fn text(&self) -> &str {
        &self.text
    }

    /// Length of `text()` without its newline.
    pub(crate) fn rest_len(&self) -> usize {
        self.text.len() - 1
    }

    /// `text()` followed by up to `max_lines` following lines.
    pub(crate) fn window(&self) -> &str {
        self.window.get_or_init(|| {
            let mut window = self.text.clone();
            for n in 1..=self.max_lines {
                let Some(next) = (self.lines)(n) else {
                    break;
                };
                window.push_str(next);
                window.push('\n');
            }
            window
        })
    }
}
