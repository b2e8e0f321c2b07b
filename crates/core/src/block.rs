//! Content block domain types.
//!
//! The model's output stream interleaves prose with a literal tag protocol:
//! reasoning in `<thinking>`, the final answer in `<present_answer>`, tool
//! invocations in `<tool_*>` elements, and hidden metadata after the answer.
//! The classifier slices that stream into typed blocks. Prose and the two
//! streaming kinds surface incrementally; tool calls and metadata stay
//! buffered until their closing tag arrives.

use serde::{Deserialize, Serialize};

/// What kind of content a block carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BlockKind {
    /// Untagged prose between blocks.
    Plain,
    /// Body of a `<thinking>` element.
    Reasoning,
    /// Body of a `<present_answer>` element.
    Answer,
    /// Body of a `<tool_*>` element, hidden until complete.
    ToolCall,
    /// Body of a hidden metadata element (`<answer>`, `<sources>`, ...).
    Metadata,
}

impl std::fmt::Display for BlockKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Plain => write!(f, "plain"),
            Self::Reasoning => write!(f, "reasoning"),
            Self::Answer => write!(f, "answer"),
            Self::ToolCall => write!(f, "tool_call"),
            Self::Metadata => write!(f, "metadata"),
        }
    }
}

impl BlockKind {
    /// Whether body text of this kind may be shown to the consumer as it
    /// streams in.
    pub fn is_visible(&self) -> bool {
        matches!(self, Self::Plain | Self::Reasoning | Self::Answer)
    }
}

/// The classifier's position in the tag protocol.
///
/// Exactly one state is active at any time; `Neutral` is the initial state
/// and the only state in which opening tags are recognized.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StreamState {
    Neutral,
    Reasoning,
    Answer,
    ToolCall,
    Metadata,
}

impl std::fmt::Display for StreamState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Neutral => write!(f, "neutral"),
            Self::Reasoning => write!(f, "reasoning"),
            Self::Answer => write!(f, "answer"),
            Self::ToolCall => write!(f, "tool_call"),
            Self::Metadata => write!(f, "metadata"),
        }
    }
}

/// A classified slice of the model's output stream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContentBlock {
    /// What kind of content this is.
    pub kind: BlockKind,

    /// Block body with all tag markup stripped.
    ///
    /// Empty for hidden blocks that were discarded at end of stream.
    pub text: String,

    /// Tool name for `ToolCall` blocks: the part after `tool_` in the tag.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_name: Option<String>,

    /// Character offset of the first body character in the preprocessed
    /// stream.
    pub start_offset: usize,

    /// One past the last body character.
    pub end_offset: usize,

    /// False when the stream ended before the closing tag arrived.
    pub complete: bool,
}

/// An incremental output of the classifier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StreamDelta {
    /// Safe-to-display text. Only emitted for visible kinds; never contains
    /// tag markup or a partial tag.
    VisibleText { kind: BlockKind, text: String },

    /// A new block opened.
    BlockStarted {
        kind: BlockKind,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        tool_name: Option<String>,
    },

    /// A block closed, or was force-closed at end of stream.
    BlockFinished { block: ContentBlock },
}
