//! The stream classifier: one buffered state machine over the tag protocol.
//!
//! Input arrives as arbitrarily fragmented text. The classifier consumes it
//! eagerly, releasing everything that is provably classified and withholding
//! only what might still become a tag: in the neutral state a suffix that
//! prefixes a known opener (bounded by the longest opener), inside a block a
//! suffix that prefixes the block's closer. Partial markup therefore never
//! reaches the consumer, and the result is identical for any fragmentation
//! of the same stream.
//!
//! One instance handles one model response.

use crate::tags::{TagMatch, TagSpec, TagTable};
use lorecall_core::{BlockKind, ContentBlock, StreamDelta, StreamState};
use tracing::{debug, warn};

/// Lines stripped when they directly wrap a tool element. Models habitually
/// fence the tool XML in markdown; the fence is framing, not prose.
const FENCE_TOKENS: [&str; 3] = ["```", "```xml", "xml"];

fn is_fence_line(line: &str) -> bool {
    FENCE_TOKENS.contains(&line)
}

fn is_fence_prefix(text: &str) -> bool {
    !text.is_empty() && FENCE_TOKENS.iter().any(|t| t.starts_with(text))
}

/// Bytes at the end of `text` that might be a fence line wrapping a tool
/// tag that has not arrived yet. These stay withheld from plain release.
fn fence_hold(text: &str) -> usize {
    if text.is_empty() {
        return 0;
    }
    match text.strip_suffix('\n') {
        Some(body) => {
            let line_start = body.rfind('\n').map(|p| p + 1).unwrap_or(0);
            if is_fence_line(&body[line_start..]) {
                text.len() - line_start + usize::from(line_start > 0)
            } else {
                // The newline alone: it may lead a fence line still to come.
                1
            }
        }
        None => {
            let line_start = text.rfind('\n').map(|p| p + 1).unwrap_or(0);
            if is_fence_prefix(&text[line_start..]) {
                text.len() - line_start + usize::from(line_start > 0)
            } else {
                0
            }
        }
    }
}

/// Bytes to drop from the end of `pre` when a tool opener follows directly:
/// a fence line plus the newlines gluing it to the tag.
fn fence_strip_len(pre: &str) -> usize {
    if pre.is_empty() {
        return 0;
    }
    let (body, trailing_nl) = match pre.strip_suffix('\n') {
        Some(b) => (b, 1),
        None => (pre, 0),
    };
    let line_start = body.rfind('\n').map(|p| p + 1).unwrap_or(0);
    if is_fence_line(&body[line_start..]) {
        (body.len() - line_start) + trailing_nl + usize::from(line_start > 0)
    } else {
        0
    }
}

/// Length in bytes of the longest suffix of `text` that is a proper prefix
/// of `tag`. Tags are ASCII; positions that are not char boundaries cannot
/// match and are skipped.
fn partial_suffix_len(text: &str, tag: &str) -> usize {
    let max = tag.len().saturating_sub(1).min(text.len());
    for take in (1..=max).rev() {
        if !text.is_char_boundary(text.len() - take) {
            continue;
        }
        if tag.starts_with(&text[text.len() - take..]) {
            return take;
        }
    }
    0
}

/// The block currently being filled.
#[derive(Debug)]
struct OpenBlock {
    kind: BlockKind,
    tool_name: Option<String>,
    /// The tag that ends this block; empty for plain runs, which end when
    /// the next tag opens.
    closer: String,
    text: String,
    start_offset: usize,
    end_offset: usize,
}

/// What the neutral-state scan found in the withheld input.
enum Found {
    Opener { at: usize, spec: TagSpec },
    Partial { at: usize },
    Nothing,
}

/// Classifies a preprocessed fragment stream into typed content blocks.
pub struct BlockClassifier {
    tags: TagTable,
    state: StreamState,
    /// Input received but not yet consumed into a block.
    held: String,
    /// Character offset of `held[0]` in the preprocessed stream.
    base_offset: usize,
    current: Option<OpenBlock>,
    blocks: Vec<ContentBlock>,
    /// Strip one fence line trailing the tool block that just closed.
    fence_after_tool: bool,
    finished: bool,
}

impl BlockClassifier {
    pub fn new() -> Self {
        Self {
            tags: TagTable::new(),
            state: StreamState::Neutral,
            held: String::new(),
            base_offset: 0,
            current: None,
            blocks: Vec::new(),
            fence_after_tool: false,
            finished: false,
        }
    }

    /// Feed one preprocessed fragment; returns the deltas it unlocked.
    pub fn push(&mut self, fragment: &str) -> Vec<StreamDelta> {
        let mut out = Vec::new();
        if self.finished {
            return out;
        }
        self.held.push_str(fragment);
        self.drain(&mut out);
        out
    }

    /// End of stream: flush or discard whatever is still open.
    ///
    /// An unclosed reasoning or answer block is flushed best-effort and
    /// marked incomplete. An unclosed tool or metadata block is recorded
    /// incomplete with its buffered content discarded, so a partial hidden
    /// payload never surfaces.
    pub fn finish(&mut self) -> Vec<StreamDelta> {
        let mut out = Vec::new();
        if self.finished {
            return out;
        }
        self.drain(&mut out);
        match self.state {
            StreamState::Neutral => {
                // End of input completes any line still pending after a tool
                // block; a full fence token there is framing and goes.
                if self.fence_after_tool {
                    let nl = usize::from(self.held.starts_with('\n'));
                    if is_fence_line(&self.held[nl..]) {
                        let n = self.held.len();
                        self.consume(n);
                    }
                    self.fence_after_tool = false;
                }
                // Withheld tag prefixes turn out to be ordinary text.
                let n = self.held.len();
                self.release_plain(n, &mut out);
                self.close_current(true, &mut out);
            }
            StreamState::Reasoning | StreamState::Answer => {
                warn!(state = %self.state, "stream ended inside an unclosed block, flushing it");
                let n = self.held.len();
                self.take_body(n, &mut out);
                self.close_current(false, &mut out);
                self.state = StreamState::Neutral;
            }
            StreamState::ToolCall | StreamState::Metadata => {
                warn!(state = %self.state, "stream ended inside an unclosed hidden block, discarding its content");
                let n = self.held.len();
                self.consume(n);
                if let Some(open) = &mut self.current {
                    open.text.clear();
                    open.end_offset = self.base_offset;
                }
                self.close_current(false, &mut out);
                self.state = StreamState::Neutral;
            }
        }
        self.finished = true;
        out
    }

    /// Current protocol state.
    pub fn state(&self) -> StreamState {
        self.state
    }

    /// All blocks closed so far, in stream order.
    pub fn blocks(&self) -> &[ContentBlock] {
        &self.blocks
    }

    /// Consume the classifier, keeping its block list.
    pub fn into_blocks(self) -> Vec<ContentBlock> {
        self.blocks
    }

    // --- state machine internals ---

    fn drain(&mut self, out: &mut Vec<StreamDelta>) {
        loop {
            let progressed = match self.state {
                StreamState::Neutral => self.drain_neutral(out),
                _ => self.drain_in_block(out),
            };
            if !progressed {
                break;
            }
        }
    }

    /// Neutral state: scan for an opener, releasing provably-plain text.
    /// Returns true when a tag opened and the state changed.
    fn drain_neutral(&mut self, out: &mut Vec<StreamDelta>) -> bool {
        if self.fence_after_tool && !self.resolve_trailing_fence() {
            return false;
        }
        match self.find_opener() {
            Found::Opener { at, spec } => {
                self.open_tag(at, spec, out);
                true
            }
            Found::Partial { at } => {
                let safe = at - fence_hold(&self.held[..at]);
                self.release_plain(safe, out);
                false
            }
            Found::Nothing => {
                let safe = self.held.len() - fence_hold(&self.held);
                self.release_plain(safe, out);
                false
            }
        }
    }

    /// Inside a block: body text accumulates until the closer arrives.
    /// Returns true when the block closed and the state changed.
    fn drain_in_block(&mut self, out: &mut Vec<StreamDelta>) -> bool {
        let (kind, closer) = match &self.current {
            Some(open) => (open.kind, open.closer.clone()),
            None => return false,
        };
        match self.held.find(&closer) {
            Some(at) => {
                self.take_body(at, out);
                self.consume(closer.len());
                self.close_current(true, out);
                if kind == BlockKind::ToolCall {
                    self.fence_after_tool = true;
                }
                self.state = StreamState::Neutral;
                true
            }
            None => {
                let hold = partial_suffix_len(&self.held, &closer);
                self.take_body(self.held.len() - hold, out);
                false
            }
        }
    }

    /// Scan `held` for the earliest position that opens (or might open) a
    /// known tag.
    fn find_opener(&self) -> Found {
        let mut pos = 0;
        while let Some(rel) = self.held[pos..].find('<') {
            let at = pos + rel;
            match self.tags.match_opener(&self.held[at..]) {
                TagMatch::Complete(spec) => return Found::Opener { at, spec },
                TagMatch::Partial => return Found::Partial { at },
                TagMatch::None => pos = at + 1,
            }
        }
        Found::Nothing
    }

    /// Open the tag at byte position `at`, releasing the plain text before
    /// it (minus a fence line glued to a tool opener).
    fn open_tag(&mut self, at: usize, spec: TagSpec, out: &mut Vec<StreamDelta>) {
        let kept = if spec.kind == BlockKind::ToolCall {
            at - fence_strip_len(&self.held[..at])
        } else {
            at
        };
        self.release_plain(kept, out);
        self.close_current(true, out);
        self.consume((at - kept) + spec.opener.len());

        debug!(kind = %spec.kind, tool = spec.tool_name.as_deref().unwrap_or(""), "block opened");
        out.push(StreamDelta::BlockStarted {
            kind: spec.kind,
            tool_name: spec.tool_name.clone(),
        });
        self.state = match spec.kind {
            BlockKind::Reasoning => StreamState::Reasoning,
            BlockKind::Answer => StreamState::Answer,
            BlockKind::ToolCall => StreamState::ToolCall,
            BlockKind::Metadata => StreamState::Metadata,
            // The table never opens plain blocks.
            BlockKind::Plain => StreamState::Neutral,
        };
        self.current = Some(OpenBlock {
            kind: spec.kind,
            tool_name: spec.tool_name,
            closer: spec.closer,
            text: String::new(),
            start_offset: self.base_offset,
            end_offset: self.base_offset,
        });
    }

    /// Release `held[..n]` as visible plain text, opening a plain run if
    /// none is active.
    fn release_plain(&mut self, n: usize, out: &mut Vec<StreamDelta>) {
        if n == 0 {
            return;
        }
        let text = self.held[..n].to_string();
        let started = self.current.is_none();
        let start = self.base_offset;
        self.consume(n);
        let end = self.base_offset;

        let block = self.current.get_or_insert_with(|| OpenBlock {
            kind: BlockKind::Plain,
            tool_name: None,
            closer: String::new(),
            text: String::new(),
            start_offset: start,
            end_offset: start,
        });
        block.text.push_str(&text);
        block.end_offset = end;

        if started {
            out.push(StreamDelta::BlockStarted {
                kind: BlockKind::Plain,
                tool_name: None,
            });
        }
        out.push(StreamDelta::VisibleText {
            kind: BlockKind::Plain,
            text,
        });
    }

    /// Move `held[..n]` into the open block's body; visible kinds also emit
    /// a text delta.
    fn take_body(&mut self, n: usize, out: &mut Vec<StreamDelta>) {
        if n == 0 {
            return;
        }
        let text = self.held[..n].to_string();
        self.consume(n);
        let end = self.base_offset;
        if let Some(open) = &mut self.current {
            open.text.push_str(&text);
            open.end_offset = end;
            if open.kind.is_visible() {
                out.push(StreamDelta::VisibleText {
                    kind: open.kind,
                    text,
                });
            }
        }
    }

    /// Close the open block, if any, and record it.
    fn close_current(&mut self, complete: bool, out: &mut Vec<StreamDelta>) {
        let Some(open) = self.current.take() else {
            return;
        };
        debug!(kind = %open.kind, complete, "block closed");
        let block = ContentBlock {
            kind: open.kind,
            text: open.text,
            tool_name: open.tool_name,
            start_offset: open.start_offset,
            end_offset: open.end_offset,
            complete,
        };
        out.push(StreamDelta::BlockFinished {
            block: block.clone(),
        });
        self.blocks.push(block);
    }

    /// After a tool block closes, a fence line may trail it. Returns false
    /// while more input is needed to decide.
    fn resolve_trailing_fence(&mut self) -> bool {
        let nl = usize::from(self.held.starts_with('\n'));
        let rest = &self.held[nl..];
        match rest.find('\n') {
            Some(line_end) => {
                if is_fence_line(&rest[..line_end]) {
                    self.consume(nl + line_end + 1);
                }
                self.fence_after_tool = false;
                true
            }
            None => {
                if rest.is_empty() || is_fence_prefix(rest) {
                    return false;
                }
                self.fence_after_tool = false;
                true
            }
        }
    }

    /// Consume `n` bytes from the front of `held`, advancing the stream
    /// offset by the corresponding character count.
    fn consume(&mut self, n: usize) {
        if n == 0 {
            return;
        }
        self.base_offset += self.held[..n].chars().count();
        self.held.drain(..n);
    }
}

impl Default for BlockClassifier {
    fn default() -> Self {
        Self::new()
    }
}
