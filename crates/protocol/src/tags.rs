//! The tag vocabulary of the stream protocol.
//!
//! Tags are literal, case-sensitive, and attribute-free. Openers are only
//! recognized in the neutral state; inside a block, only that block's
//! matching closer is special. Everything else is body text.

use lorecall_core::BlockKind;

/// Wire names of the tools the model may invoke, each wrapped as
/// `<tool_NAME>` ... `</tool_NAME>`.
pub const TOOL_NAMES: [&str; 6] = [
    "semantic_search",
    "lexical_search",
    "regex_search",
    "get_file_content",
    "get_file_section",
    "web_crawler",
];

/// Hidden metadata elements the model appends after the answer.
pub const METADATA_NAMES: [&str; 4] = ["answer", "sources", "confidence", "suggestions"];

/// Whether `name` is a tool the protocol knows.
pub fn is_known_tool(name: &str) -> bool {
    TOOL_NAMES.contains(&name)
}

/// One recognized element of the protocol.
#[derive(Debug, Clone)]
pub struct TagSpec {
    /// Which block kind the element opens.
    pub kind: BlockKind,
    /// Tool wire name, for tool tags.
    pub tool_name: Option<String>,
    /// Full opening tag, e.g. `<tool_semantic_search>`.
    pub opener: String,
    /// Full closing tag, e.g. `</tool_semantic_search>`.
    pub closer: String,
}

/// Outcome of matching buffered text (starting at a `<`) against the
/// opener table.
#[derive(Debug, Clone)]
pub enum TagMatch {
    /// A full opener sits at the start of the text.
    Complete(TagSpec),
    /// The text is a proper prefix of at least one opener; need more input.
    Partial,
    /// The text cannot start any known opener.
    None,
}

/// The complete opener table plus derived bounds.
#[derive(Debug, Clone)]
pub struct TagTable {
    specs: Vec<TagSpec>,
    longest_opener: usize,
}

impl TagTable {
    /// Build the protocol's tag table.
    pub fn new() -> Self {
        let mut specs = vec![
            TagSpec {
                kind: BlockKind::Reasoning,
                tool_name: None,
                opener: "<thinking>".into(),
                closer: "</thinking>".into(),
            },
            TagSpec {
                kind: BlockKind::Answer,
                tool_name: None,
                opener: "<present_answer>".into(),
                closer: "</present_answer>".into(),
            },
        ];

        for name in TOOL_NAMES {
            specs.push(TagSpec {
                kind: BlockKind::ToolCall,
                tool_name: Some(name.to_string()),
                opener: format!("<tool_{name}>"),
                closer: format!("</tool_{name}>"),
            });
        }

        for name in METADATA_NAMES {
            specs.push(TagSpec {
                kind: BlockKind::Metadata,
                tool_name: None,
                opener: format!("<{name}>"),
                closer: format!("</{name}>"),
            });
        }

        let longest_opener = specs.iter().map(|s| s.opener.len()).max().unwrap_or(0);
        Self {
            specs,
            longest_opener,
        }
    }

    /// All known elements.
    pub fn specs(&self) -> &[TagSpec] {
        &self.specs
    }

    /// Length of the longest opener. Bounds how far back the classifier
    /// ever withholds neutral text while waiting for a tag to complete.
    pub fn longest_opener(&self) -> usize {
        self.longest_opener
    }

    /// Match `text` against the opener table.
    ///
    /// No opener is a prefix of another (each ends with the only `>` it
    /// contains), so a complete match is unambiguous.
    pub fn match_opener(&self, text: &str) -> TagMatch {
        let mut partial = false;
        for spec in &self.specs {
            if text.starts_with(&spec.opener) {
                return TagMatch::Complete(spec.clone());
            }
            if text.len() < spec.opener.len() && spec.opener.starts_with(text) {
                partial = true;
            }
        }
        if partial {
            TagMatch::Partial
        } else {
            TagMatch::None
        }
    }
}

impl Default for TagTable {
    fn default() -> Self {
        Self::new()
    }
}
