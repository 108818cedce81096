use crate::span::Span;

/// A generator diagnostic (error or warning).
#[derive(Clone, Debug)]
pub struct Diagnostic {
    pub severity: Severity,
    pub kind: Option<ErrorKind>,
    pub message: String,
    pub span: Span,
    /// Secondary locations, e.g. the earlier binding a duplicate collides with.
    pub labels: Vec<(Span, String)>,
    pub notes: Vec<String>,
    pub help: Option<String>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Severity {
    Error,
    Warning,
}

/// Which part of the generator rejected the input.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ErrorKind {
    /// Unsupported statement or expression, unresolvable reference.
    Structural,
    /// A value whose type is not usable inside a shader.
    Type,
    /// Buffer, texture or color target binding problems.
    ResourceBinding,
    /// Non-constant or malformed sampler configuration, sampler overflow.
    Sampler,
    /// External shader compiler reported a problem.
    Backend,
    /// The runtime header declarations are incomplete.
    Catalog,
}

impl Diagnostic {
    pub fn error(message: String, span: Span) -> Self {
        Self {
            severity: Severity::Error,
            kind: None,
            message,
            span,
            labels: Vec::new(),
            notes: Vec::new(),
            help: None,
        }
    }

    pub fn warning(message: String, span: Span) -> Self {
        Self {
            severity: Severity::Warning,
            kind: None,
            message,
            span,
            labels: Vec::new(),
            notes: Vec::new(),
            help: None,
        }
    }

    pub fn with_kind(mut self, kind: ErrorKind) -> Self {
        self.kind = Some(kind);
        self
    }

    pub fn with_label(mut self, span: Span, message: String) -> Self {
        self.labels.push((span, message));
        self
    }

    pub fn with_note(mut self, note: String) -> Self {
        self.notes.push(note);
        self
    }

    pub fn with_help(mut self, help: String) -> Self {
        self.help = Some(help);
        self
    }

    pub fn is_error(&self) -> bool {
        self.severity == Severity::Error
    }

    /// Render the diagnostic to stderr using ariadne.
    ///
    /// Front ends that serialize only the tree leave `source` empty; the
    /// diagnostic then degrades to a single line plus its notes.
    pub fn render(&self, filename: &str, source: &str) {
        use ariadne::{Color, Label, Report, ReportKind, Source};

        let in_source = |span: &Span| !span.is_dummy() && (span.end as usize) <= source.len();
        if !in_source(&self.span) {
            self.render_plain(filename);
            return;
        }

        let kind = match self.severity {
            Severity::Error => ReportKind::Error,
            Severity::Warning => ReportKind::Warning,
        };

        let color = match self.severity {
            Severity::Error => Color::Red,
            Severity::Warning => Color::Yellow,
        };

        let mut report = Report::build(kind, filename, self.span.start as usize)
            .with_message(&self.message)
            .with_label(
                Label::new((filename, self.span.range()))
                    .with_message(&self.message)
                    .with_color(color),
            );

        for (span, message) in self.labels.iter().filter(|(span, _)| in_source(span)) {
            report = report.with_label(
                Label::new((filename, span.range()))
                    .with_message(message)
                    .with_color(Color::Blue),
            );
        }

        for note in &self.notes {
            report = report.with_note(note);
        }

        if let Some(help) = &self.help {
            report = report.with_help(help);
        }

        if let Err(err) = report.finish().eprint((filename, Source::from(source))) {
            log::warn!("failed to render diagnostic: {}", err);
        }
    }

    fn render_plain(&self, filename: &str) {
        let severity = match self.severity {
            Severity::Error => "error",
            Severity::Warning => "warning",
        };
        eprintln!("{}: {}: {}", filename, severity, self.message);
        for (_, message) in &self.labels {
            eprintln!("  note: {}", message);
        }
        for note in &self.notes {
            eprintln!("  note: {}", note);
        }
        if let Some(help) = &self.help {
            eprintln!("  help: {}", help);
        }
    }
}

/// Render a list of diagnostics.
pub fn render_diagnostics(diagnostics: &[Diagnostic], filename: &str, source: &str) {
    for diag in diagnostics {
        diag.render(filename, source);
    }
}

/// True when any diagnostic in the list is an error.
pub fn has_errors(diagnostics: &[Diagnostic]) -> bool {
    diagnostics.iter().any(Diagnostic::is_error)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_construction() {
        let span = Span::new(10, 15);
        let d = Diagnostic::error("vertex position must be a float4".to_string(), span)
            .with_kind(ErrorKind::Type);
        assert_eq!(d.severity, Severity::Error);
        assert_eq!(d.kind, Some(ErrorKind::Type));
        assert_eq!(d.span.start, 10);
        assert_eq!(d.span.end, 15);
        assert!(d.notes.is_empty());
        assert!(d.labels.is_empty());
        assert!(d.help.is_none());
    }

    #[test]
    fn test_warning_is_not_error() {
        let d = Diagnostic::warning("dxc: implicit truncation".to_string(), Span::dummy());
        assert!(!d.is_error());
        assert!(!has_errors(&[d.clone()]));
        assert!(has_errors(&[d, Diagnostic::error("x".into(), Span::dummy())]));
    }

    #[test]
    fn test_chained_builders() {
        let d = Diagnostic::error("vertex buffer index must be unique".to_string(), Span::new(20, 30))
            .with_label(Span::new(2, 8), "previous buffer index here".to_string())
            .with_note("note 1".to_string())
            .with_help("pick an unused index".to_string());
        assert_eq!(d.labels.len(), 1);
        assert_eq!(d.labels[0].1, "previous buffer index here");
        assert_eq!(d.notes.len(), 1);
        assert!(d.help.is_some());
    }

    #[test]
    fn test_render_does_not_panic() {
        let source = "void draw(float4x4 xf) {\n  position = xf;\n}\n";
        let d = Diagnostic::error("vertex position must be a float4".to_string(), Span::new(27, 35))
            .with_label(Span::new(10, 21), "declared here".to_string());
        d.render("draw.cpp", source);
    }

    #[test]
    fn test_render_without_source_does_not_panic() {
        let diagnostics = vec![
            Diagnostic::warning("first".to_string(), Span::new(4, 5)),
            Diagnostic::error("second".to_string(), Span::dummy()),
        ];
        render_diagnostics(&diagnostics, "draw.json", "");
    }
}
