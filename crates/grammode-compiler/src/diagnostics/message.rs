use grammode_core::Span;

/// Diagnostic kinds ordered by priority (highest priority first).
///
/// Grammar shape problems come first: later checks assume a well-formed
/// rule table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum DiagnosticKind {
    // Rule table shape
    EmptyGrammar,
    DuplicateRule,
    MultipleStartRules,

    // References between rules
    UndefinedReference,
    WrongArgumentCount,
    ParamWithArguments,
    EntryRuleWithParams,
    InstantiationLimit,

    // Post-simplification verification
    NoProgressCycle,

    // Warnings
    UnusedRule,
}

impl DiagnosticKind {
    pub fn default_severity(&self) -> Severity {
        match self {
            Self::UnusedRule => Severity::Warning,
            _ => Severity::Error,
        }
    }

    /// Default hint for this kind, automatically included in diagnostics.
    pub fn default_hint(&self) -> Option<&'static str> {
        match self {
            Self::MultipleStartRules => Some("mark exactly one rule as the start rule"),
            Self::InstantiationLimit => {
                Some("recursive calls should pass the same arguments they received")
            }
            Self::NoProgressCycle => {
                Some("every loop and recursive call must consume input before repeating")
            }
            _ => None,
        }
    }

    /// Base message for this diagnostic kind, used when no custom message is provided.
    pub fn fallback_message(&self) -> &'static str {
        match self {
            Self::EmptyGrammar => "grammar defines no rules",
            Self::DuplicateRule => "duplicate rule",
            Self::MultipleStartRules => "multiple start rules",
            Self::UndefinedReference => "undefined reference",
            Self::WrongArgumentCount => "wrong number of arguments",
            Self::ParamWithArguments => "parameters cannot take arguments",
            Self::EntryRuleWithParams => "entry rules cannot take parameters",
            Self::InstantiationLimit => "too many instantiations",
            Self::NoProgressCycle => "cycle consumes no input",
            Self::UnusedRule => "unused rule",
        }
    }

    /// Template for custom messages. Contains `{}` placeholder for caller-provided detail.
    pub fn custom_message(&self) -> String {
        match self {
            Self::DuplicateRule => "`{}` is already defined".to_string(),
            Self::MultipleStartRules => "`{}` is also marked as the start rule".to_string(),
            Self::UndefinedReference => "`{}` is not defined".to_string(),
            Self::ParamWithArguments => "parameter `{}` cannot take arguments".to_string(),
            Self::EntryRuleWithParams => {
                "`{}` is an entry rule and cannot take parameters".to_string()
            }
            Self::InstantiationLimit => {
                "`{}` is instantiated with too many distinct arguments".to_string()
            }
            Self::UnusedRule => "`{}` is never used".to_string(),
            _ => format!("{}: {{}}", self.fallback_message()),
        }
    }

    /// Render the final message.
    ///
    /// - `None` → returns `fallback_message()`
    /// - `Some(detail)` → returns `custom_message()` with `{}` replaced by detail
    pub fn message(&self, msg: Option<&str>) -> String {
        match msg {
            None => self.fallback_message().to_string(),
            Some(detail) => self.custom_message().replace("{}", detail),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Severity {
    #[default]
    Error,
    Warning,
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Severity::Error => write!(f, "error"),
            Severity::Warning => write!(f, "warning"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelatedInfo {
    pub(crate) span: Span,
    pub(crate) message: String,
}

impl RelatedInfo {
    pub fn new(span: Span, message: impl Into<String>) -> Self {
        Self {
            span,
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiagnosticMessage {
    pub(crate) kind: DiagnosticKind,
    /// The range shown to the user (underlined in output).
    pub(crate) span: Span,
    pub(crate) message: String,
    pub(crate) related: Vec<RelatedInfo>,
    pub(crate) hints: Vec<String>,
}

impl DiagnosticMessage {
    pub(crate) fn new(kind: DiagnosticKind, span: Span, message: impl Into<String>) -> Self {
        Self {
            kind,
            span,
            message: message.into(),
            related: Vec::new(),
            hints: kind.default_hint().map(String::from).into_iter().collect(),
        }
    }

    pub(crate) fn with_default_message(kind: DiagnosticKind, span: Span) -> Self {
        Self::new(kind, span, kind.fallback_message())
    }

    pub fn kind(&self) -> DiagnosticKind {
        self.kind
    }

    pub fn span(&self) -> Span {
        self.span
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn severity(&self) -> Severity {
        self.kind.default_severity()
    }

    pub fn is_error(&self) -> bool {
        self.severity() == Severity::Error
    }

    pub fn is_warning(&self) -> bool {
        self.severity() == Severity::Warning
    }
}

impl std::fmt::Display for DiagnosticMessage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} at {}..{}: {}",
            self.severity(),
            self.span.start,
            self.span.end,
            self.message
        )?;
        for related in &self.related {
            write!(
                f,
                " (related: {} at {}..{})",
                related.message, related.span.start, related.span.end
            )?;
        }
        for hint in &self.hints {
            write!(f, " (hint: {})", hint)?;
        }
        Ok(())
    }
}
