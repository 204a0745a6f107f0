use std::fmt;
use std::ops::Range;

use serde::{Deserialize, Serialize};

/// Classification of one contiguous span in a diff result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EditTag {
    /// Span is identical on both sides.
    Equal,
    /// Span on side A was replaced by the span on side B.
    Replace,
    /// Span exists only on side A.
    Delete,
    /// Span exists only on side B.
    Insert,
}

impl fmt::Display for EditTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            EditTag::Equal => "equal",
            EditTag::Replace => "replace",
            EditTag::Delete => "delete",
            EditTag::Insert => "insert",
        };
        f.write_str(s)
    }
}

/// One edit operation: `a[start_a..end_a]` relates to `b[start_b..end_b]`.
///
/// Offsets count characters (Unicode scalar values), not bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EditOp {
    pub tag: EditTag,
    pub start_a: usize,
    pub end_a: usize,
    pub start_b: usize,
    pub end_b: usize,
}

impl EditOp {
    pub fn new(tag: EditTag, a: Range<usize>, b: Range<usize>) -> Self {
        Self {
            tag,
            start_a: a.start,
            end_a: a.end,
            start_b: b.start,
            end_b: b.end,
        }
    }

    pub fn range_a(&self) -> Range<usize> {
        self.start_a..self.end_a
    }

    pub fn range_b(&self) -> Range<usize> {
        self.start_b..self.end_b
    }

    pub fn is_change(&self) -> bool {
        self.tag != EditTag::Equal
    }
}

/// Ordered edit script produced by a sequence matcher.
pub type EditScript = Vec<EditOp>;

/// Rebuild the A and B texts from the spans an edit script covers.
///
/// Returns `None` if any op points outside the given texts. Useful for checking
/// that a script covers both inputs end to end.
pub fn reconstruct(a: &str, b: &str, ops: &[EditOp]) -> Option<(String, String)> {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    let mut out_a = String::new();
    let mut out_b = String::new();
    for op in ops {
        out_a.extend(a.get(op.range_a())?);
        out_b.extend(b.get(op.range_b())?);
    }
    Some((out_a, out_b))
}
