//! Token preprocessing applied before classification.

/// Collapses runs of two or more newlines to exactly one, across fragment
/// boundaries.
///
/// The squasher withholds trailing newlines until the next fragment shows
/// whether the run continues, so the collapse is identical no matter how
/// the stream is fragmented. Call [`NewlineSquasher::finish`] at end of
/// stream to flush the last withheld newline.
#[derive(Debug, Default)]
pub struct NewlineSquasher {
    /// Consecutive newlines seen at the current end of input.
    pending: usize,
}

impl NewlineSquasher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one fragment; returns the squashed text ready for the
    /// classifier.
    pub fn feed(&mut self, fragment: &str) -> String {
        let mut out = String::with_capacity(fragment.len());
        for ch in fragment.chars() {
            if ch == '\n' {
                self.pending += 1;
            } else {
                if self.pending > 0 {
                    out.push('\n');
                    self.pending = 0;
                }
                out.push(ch);
            }
        }
        out
    }

    /// Flush the withheld newline at end of stream, if any.
    pub fn finish(&mut self) -> String {
        if self.pending > 0 {
            self.pending = 0;
            "\n".into()
        } else {
            String::new()
        }
    }
}
