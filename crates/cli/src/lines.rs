//! Line-level pass: find which lines were replaced, inserted or deleted.

use similar::{capture_diff_slices, Algorithm, DiffTag};

/// A line of the left file replaced by a line of the right file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplacedLine {
    /// Zero-based line number in the left file.
    pub left_no: usize,
    /// Zero-based line number in the right file.
    pub right_no: usize,
    pub left: String,
    pub right: String,
}

/// Outcome of the line-level diff.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct LineDiff {
    pub replaced: Vec<ReplacedLine>,
    pub deleted: usize,
    pub inserted: usize,
    pub unchanged: usize,
}

/// Diff `left` against `right` by lines.
///
/// Replace blocks are paired up line by line; lines left over in an
/// unbalanced block count as deletions or insertions.
pub fn diff_lines(left: &str, right: &str) -> LineDiff {
    let old: Vec<&str> = left.lines().collect();
    let new: Vec<&str> = right.lines().collect();
    let mut out = LineDiff::default();

    for op in capture_diff_slices(Algorithm::Myers, &old, &new) {
        let (tag, old_range, new_range) = op.as_tag_tuple();
        match tag {
            DiffTag::Equal => out.unchanged += old_range.len(),
            DiffTag::Delete => out.deleted += old_range.len(),
            DiffTag::Insert => out.inserted += new_range.len(),
            DiffTag::Replace => {
                for (left_no, right_no) in old_range.clone().zip(new_range.clone()) {
                    out.replaced.push(ReplacedLine {
                        left_no,
                        right_no,
                        left: old[left_no].to_string(),
                        right: new[right_no].to_string(),
                    });
                }
                let paired = old_range.len().min(new_range.len());
                out.deleted += old_range.len() - paired;
                out.inserted += new_range.len() - paired;
            }
        }
    }
    out
}
