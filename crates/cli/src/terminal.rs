use std::io::{self, Write};

use anyhow::Result;
use crossterm::{
    queue,
    style::{Attribute, Color, Print, ResetColor, SetAttribute, SetBackgroundColor, SetForegroundColor},
};

use mergeline_core::EditOp;

use crate::lines::{LineDiff, ReplacedLine};

/// Color scheme for terminal output.
struct Colors;

impl Colors {
    const HEADER: Color = Color::Magenta;
    const DIM: Color = Color::DarkGrey;
    const REMOVED: Color = Color::Red;
    const ADDED: Color = Color::Green;
    const REMOVED_BG: Color = Color::DarkRed;
    const ADDED_BG: Color = Color::DarkGreen;
    const WARNING: Color = Color::Yellow;
}

/// Which side of an edit script to render.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    Left,
    Right,
}

/// Split `text` into runs, flagging the runs an edit script marks as changed.
pub fn segments(text: &str, edits: &[EditOp], side: Side) -> Vec<(String, bool)> {
    let chars: Vec<char> = text.chars().collect();
    let mut out: Vec<(String, bool)> = Vec::new();
    for op in edits {
        let range = match side {
            Side::Left => op.range_a(),
            Side::Right => op.range_b(),
        };
        if range.is_empty() || range.end > chars.len() {
            continue;
        }
        let run: String = chars[range].iter().collect();
        let changed = op.is_change();
        match out.last_mut() {
            Some((prev, prev_changed)) if *prev_changed == changed => prev.push_str(&run),
            _ => out.push((run, changed)),
        }
    }
    out
}

/// Writes diff output to stdout.
pub struct Terminal {
    color: bool,
}

impl Terminal {
    pub fn new(color: bool) -> Self {
        Self { color }
    }

    pub fn print_header(&self, left: &str, right: &str) -> Result<()> {
        let mut stdout = io::stdout();
        self.styled(&mut stdout, Some(Colors::HEADER), None, &format!("--- {left}\n+++ {right}\n"))?;
        stdout.flush()?;
        Ok(())
    }

    /// Print one replaced line pair, highlighting changed characters when
    /// inline edits are available.
    pub fn print_pair(&self, line: &ReplacedLine, edits: Option<&[EditOp]>) -> Result<()> {
        let mut stdout = io::stdout();
        self.styled(
            &mut stdout,
            Some(Colors::DIM),
            None,
            &format!("@@ {} -> {} @@\n", line.left_no + 1, line.right_no + 1),
        )?;
        self.print_side(&mut stdout, "-", &line.left, edits, Side::Left)?;
        self.print_side(&mut stdout, "+", &line.right, edits, Side::Right)?;
        stdout.flush()?;
        Ok(())
    }

    fn print_side(
        &self,
        out: &mut impl Write,
        marker: &str,
        text: &str,
        edits: Option<&[EditOp]>,
        side: Side,
    ) -> Result<()> {
        let (fg, bg) = match side {
            Side::Left => (Colors::REMOVED, Colors::REMOVED_BG),
            Side::Right => (Colors::ADDED, Colors::ADDED_BG),
        };
        self.styled(out, Some(fg), None, marker)?;
        match edits {
            Some(edits) => {
                for (run, changed) in segments(text, edits, side) {
                    if changed {
                        if self.color {
                            queue!(out, SetAttribute(Attribute::Bold))?;
                        }
                        self.styled(out, Some(fg), Some(bg), &run)?;
                        if self.color {
                            queue!(out, SetAttribute(Attribute::Reset))?;
                        }
                    } else {
                        self.styled(out, Some(fg), None, &run)?;
                    }
                }
            }
            None => self.styled(out, Some(fg), None, text)?,
        }
        queue!(out, Print("\n"))?;
        Ok(())
    }

    pub fn print_summary(&self, diff: &LineDiff, unmatched: usize) -> Result<()> {
        let mut stdout = io::stdout();
        self.styled(
            &mut stdout,
            Some(Colors::DIM),
            None,
            &format!(
                "{} replaced, {} deleted, {} inserted, {} unchanged\n",
                diff.replaced.len(),
                diff.deleted,
                diff.inserted,
                diff.unchanged
            ),
        )?;
        if unmatched > 0 {
            self.styled(
                &mut stdout,
                Some(Colors::WARNING),
                None,
                &format!("{unmatched} line pairs have no inline highlight\n"),
            )?;
        }
        stdout.flush()?;
        Ok(())
    }

    fn styled(&self, out: &mut impl Write, fg: Option<Color>, bg: Option<Color>, text: &str) -> Result<()> {
        if !self.color {
            queue!(out, Print(text))?;
            return Ok(());
        }
        if let Some(fg) = fg {
            queue!(out, SetForegroundColor(fg))?;
        }
        if let Some(bg) = bg {
            queue!(out, SetBackgroundColor(bg))?;
        }
        queue!(out, Print(text), ResetColor)?;
        Ok(())
    }
}
