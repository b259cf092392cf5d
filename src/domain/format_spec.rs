//! Parameter Format Module
//!
//! Defines the printf-style specifiers the tracer accepts for captured
//! parameters.

/// Supported parameter formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormatSpec {
    Int,
    Unsigned,
    Long,
    UnsignedLong,
    LongLong,
    UnsignedLongLong,
    Hex,
    LongHex,
    Char,
    String,
    KernelSymbol,
    UserSymbol,
}

impl FormatSpec {
    /// Every format, in the order the UI lists them.
    pub fn all() -> &'static [FormatSpec] {
        &[
            FormatSpec::Int,
            FormatSpec::Unsigned,
            FormatSpec::Long,
            FormatSpec::UnsignedLong,
            FormatSpec::LongLong,
            FormatSpec::UnsignedLongLong,
            FormatSpec::Hex,
            FormatSpec::LongHex,
            FormatSpec::Char,
            FormatSpec::String,
            FormatSpec::KernelSymbol,
            FormatSpec::UserSymbol,
        ]
    }

    /// Parse a format from its label (CLI / UI input).
    pub fn from_label(s: &str) -> Option<FormatSpec> {
        let wanted = s.trim().to_lowercase();
        Self::all().iter().copied().find(|f| f.label() == wanted)
    }

    /// Parse a format from its specifier, e.g. `%lu`.
    pub fn from_specifier(s: &str) -> Option<FormatSpec> {
        let wanted = s.trim();
        Self::all().iter().copied().find(|f| f.specifier() == wanted)
    }

    /// Parse an option value as submitted by the UI select box: `label:specifier`,
    /// a bare label, or a bare specifier.
    pub fn from_option(s: &str) -> Option<FormatSpec> {
        if let Some((label, spec)) = s.split_once(':') {
            let by_label = Self::from_label(label);
            let by_spec = Self::from_specifier(spec);
            return match (by_label, by_spec) {
                (Some(a), Some(b)) if a == b => Some(a),
                (Some(_), Some(_)) => None,
                (a, b) => a.or(b),
            };
        }
        Self::from_label(s).or_else(|| Self::from_specifier(s))
    }

    /// Human readable name.
    pub fn label(&self) -> &'static str {
        match self {
            FormatSpec::Int => "int",
            FormatSpec::Unsigned => "unsigned",
            FormatSpec::Long => "long",
            FormatSpec::UnsignedLong => "unsigned long",
            FormatSpec::LongLong => "long long",
            FormatSpec::UnsignedLongLong => "unsigned long long",
            FormatSpec::Hex => "hex",
            FormatSpec::LongHex => "long hex",
            FormatSpec::Char => "char",
            FormatSpec::String => "string",
            FormatSpec::KernelSymbol => "kernel symbol",
            FormatSpec::UserSymbol => "user symbol",
        }
    }

    /// The specifier placed in the tracer's format string.
    pub fn specifier(&self) -> &'static str {
        match self {
            FormatSpec::Int => "%d",
            FormatSpec::Unsigned => "%u",
            FormatSpec::Long => "%ld",
            FormatSpec::UnsignedLong => "%lu",
            FormatSpec::LongLong => "%lld",
            FormatSpec::UnsignedLongLong => "%llu",
            FormatSpec::Hex => "%x",
            FormatSpec::LongHex => "%lx",
            FormatSpec::Char => "%c",
            FormatSpec::String => "%s",
            FormatSpec::KernelSymbol => "%K",
            FormatSpec::UserSymbol => "%U",
        }
    }

    /// `label:specifier`, the value format the UI select box uses.
    pub fn option_value(&self) -> String {
        format!("{}:{}", self.label(), self.specifier())
    }
}

impl Default for FormatSpec {
    fn default() -> Self {
        FormatSpec::Int
    }
}

impl std::fmt::Display for FormatSpec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.specifier())
    }
}
