//! Builder-pattern printer for rendering diagnostics.

use std::fmt::Write;

use annotate_snippets::{AnnotationKind, Group, Level, Renderer, Snippet};

use super::{Diagnostics, Span};

/// Builder for rendering diagnostics with various options.
pub struct DiagnosticsPrinter<'d, 's> {
    diagnostics: &'d Diagnostics,
    source: Option<&'s str>,
    path: Option<&'s str>,
    colored: bool,
}

impl<'d, 's> DiagnosticsPrinter<'d, 's> {
    pub fn new(diagnostics: &'d Diagnostics) -> Self {
        Self {
            diagnostics,
            source: None,
            path: None,
            colored: false,
        }
    }

    pub fn source(mut self, source: &'s str) -> Self {
        self.source = Some(source);
        self
    }

    pub fn path(mut self, path: &'s str) -> Self {
        self.path = Some(path);
        self
    }

    pub fn colored(mut self, value: bool) -> Self {
        self.colored = value;
        self
    }

    pub fn render(&self) -> String {
        let mut out = String::new();
        self.format(&mut out).expect("String write never fails");
        out
    }

    pub fn format(&self, w: &mut impl Write) -> std::fmt::Result {
        let Some(source) = self.source else {
            return self.format_plain(w);
        };

        let renderer = if self.colored {
            Renderer::styled()
        } else {
            Renderer::plain()
        };

        for (i, error) in self.diagnostics.iter().enumerate() {
            if i > 0 {
                w.write_char('\n')?;
            }
            let message = error.kind.to_string();
            let Some(span) = error.span else {
                writeln!(w, "error: {message}")?;
                continue;
            };

            let mut snippet = Snippet::source(source).line_start(1).annotation(
                AnnotationKind::Primary
                    .span(byte_range(source, span))
                    .label(&message),
            );
            if let Some(p) = self.path {
                snippet = snippet.path(p);
            }

            let report: Vec<Group> = vec![Level::ERROR.primary_title(&message).element(snippet)];
            write!(w, "{}", renderer.render(&report))?;
        }
        Ok(())
    }

    fn format_plain(&self, w: &mut impl Write) -> std::fmt::Result {
        for (i, error) in self.diagnostics.iter().enumerate() {
            if i > 0 {
                w.write_char('\n')?;
            }
            write!(w, "{error}")?;
        }
        Ok(())
    }
}

/// Byte range covering the token starting at `span`.
///
/// The range runs to the end of the identifier or number at that position,
/// or a single character otherwise.
fn byte_range(source: &str, span: Span) -> std::ops::Range<usize> {
    let mut start = 0;
    for _ in 1..span.line.max(1) {
        match source[start..].find('\n') {
            Some(n) => start += n + 1,
            None => break,
        }
    }
    let line_end = source[start..].find('\n').map_or(source.len(), |n| start + n);
    let mut start = (start + span.column.saturating_sub(1) as usize).min(line_end);
    while !source.is_char_boundary(start) {
        start -= 1;
    }

    let token_len = source[start..line_end]
        .find(|c: char| !(c.is_alphanumeric() || c == '_'))
        .unwrap_or(line_end - start);
    let end = (start + token_len.max(1)).min(source.len());
    start..end
}
