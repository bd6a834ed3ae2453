use serde::{Deserialize, Serialize};

/// Rendering options for [`crate::TraceBackend`] listings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TraceConfig {
    pub use_colors: bool,
    pub indent_style: IndentStyle,
    /// Prefix each line with the event category, e.g. `[mem]`.
    pub tag_kinds: bool,
}

impl Default for TraceConfig {
    fn default() -> Self {
        Self {
            use_colors: true,
            indent_style: IndentStyle::Spaces(2),
            tag_kinds: false,
        }
    }
}

impl TraceConfig {
    /// Uncolored output, suitable for comparing against expected listings.
    pub fn plain() -> Self {
        Self {
            use_colors: false,
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum IndentStyle {
    Spaces(usize),
    Tabs,
}

impl IndentStyle {
    /// One nesting level of indentation.
    pub fn unit(&self) -> String {
        match self {
            IndentStyle::Spaces(n) => " ".repeat(*n),
            IndentStyle::Tabs => "\t".to_string(),
        }
    }
}
