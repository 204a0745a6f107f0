//! Sequence matchers: the pure `(text_a, text_b) -> edits` function run on workers.

use similar::{Algorithm, DiffTag};

use mergeline_core::{EditOp, EditScript, EditTag, MatcherConfig};

/// Error type for matcher failures.
#[derive(Debug, thiserror::Error)]
pub enum MatchError {
    #[error("input too large: {len} chars exceeds limit of {limit}")]
    InputTooLarge { len: usize, limit: usize },
    #[error("matcher panicked: {0}")]
    Panicked(String),
    #[error("Match failed: {0}")]
    Failed(String),
}

/// Computes an ordered edit script between two texts.
///
/// Implementations must be deterministic and free of side effects; the worker
/// pool may call them from any of its threads.
pub trait SequenceMatcher: Send + Sync {
    /// Human-readable name for logging.
    fn name(&self) -> &str;

    fn edits(&self, text_a: &str, text_b: &str) -> Result<EditScript, MatchError>;
}

/// Character-level Myers matcher used for inline highlighting.
#[derive(Debug, Clone, Default)]
pub struct InlineMatcher {
    max_input_chars: Option<usize>,
}

impl InlineMatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Refuse inputs longer than `limit` characters on either side.
    pub fn with_max_input_chars(limit: usize) -> Self {
        Self { max_input_chars: Some(limit) }
    }

    /// Matcher honoring `max_input_chars` from the config (0 = no limit).
    pub fn from_config(config: &MatcherConfig) -> Self {
        match config.max_input_chars {
            0 => Self::new(),
            limit => Self::with_max_input_chars(limit),
        }
    }

    fn check_len(&self, len: usize) -> Result<(), MatchError> {
        match self.max_input_chars {
            Some(limit) if len > limit => Err(MatchError::InputTooLarge { len, limit }),
            _ => Ok(()),
        }
    }
}

impl SequenceMatcher for InlineMatcher {
    fn name(&self) -> &str {
        "inline_myers"
    }

    fn edits(&self, text_a: &str, text_b: &str) -> Result<EditScript, MatchError> {
        let a: Vec<char> = text_a.chars().collect();
        let b: Vec<char> = text_b.chars().collect();
        self.check_len(a.len())?;
        self.check_len(b.len())?;

        let ops = similar::capture_diff_slices(Algorithm::Myers, &a, &b)
            .iter()
            .map(|op| {
                let (tag, range_a, range_b) = op.as_tag_tuple();
                EditOp::new(convert_tag(tag), range_a, range_b)
            })
            .collect();
        Ok(ops)
    }
}

fn convert_tag(tag: DiffTag) -> EditTag {
    match tag {
        DiffTag::Equal => EditTag::Equal,
        DiffTag::Delete => EditTag::Delete,
        DiffTag::Insert => EditTag::Insert,
        DiffTag::Replace => EditTag::Replace,
    }
}
