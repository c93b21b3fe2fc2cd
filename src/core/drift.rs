//! core::drift
//!
//! Line-oriented comparison of the seed and current documents.
//!
//! The comparison is textual, not structural: reordering keys or editing a
//! comment is drift. Lines keep their terminators, so an empty
//! [`ChangeSet`] means the two texts are byte-identical.
//!
//! A [`ChangeSet`] is computed in full when [`diff`] returns. Callers need
//! the counts and hunk boundaries before rendering anything, which a lazy
//! sequence would have to recompute.
//!
//! # Example
//!
//! ```
//! use confkit::core::drift::{diff, LineKind};
//!
//! let changes = diff("port: 5432\n", "port: 5433\n");
//! let kinds: Vec<LineKind> = changes.iter().map(|l| l.kind).collect();
//! assert_eq!(kinds, [LineKind::Removed, LineKind::Added]);
//!
//! assert!(diff("a: 1\n", "a: 1\n").is_empty());
//! ```

use std::fmt::Write as _;
use std::time::Duration;

use similar::{Algorithm, ChangeTag, TextDiff};

/// Default number of context lines around a hunk.
pub const DEFAULT_CONTEXT: usize = 3;

/// Time after which [`diff`] stops looking for a minimal edit script.
pub const DIFF_TIMEOUT: Duration = Duration::from_secs(2);

/// Label of one line in a [`ChangeSet`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineKind {
    Context,
    Added,
    Removed,
}

impl LineKind {
    fn marker(self) -> char {
        match self {
            LineKind::Context => ' ',
            LineKind::Added => '+',
            LineKind::Removed => '-',
        }
    }
}

/// A labeled line, terminator included.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiffLine {
    pub kind: LineKind,
    pub text: String,
}

/// Edit script between two texts. Recomputed on every call, never cached.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChangeSet {
    lines: Vec<DiffLine>,
}

impl ChangeSet {
    /// True when the texts were identical.
    pub fn is_empty(&self) -> bool {
        !self.lines.iter().any(|l| l.kind != LineKind::Context)
    }

    /// Every line of both texts, in order.
    pub fn iter(&self) -> impl Iterator<Item = &DiffLine> {
        self.lines.iter()
    }

    /// Lines only in the current text.
    pub fn added(&self) -> usize {
        self.count(LineKind::Added)
    }

    /// Lines only in the seed text.
    pub fn removed(&self) -> usize {
        self.count(LineKind::Removed)
    }

    fn count(&self, kind: LineKind) -> usize {
        self.lines.iter().filter(|l| l.kind == kind).count()
    }

    /// Render as a unified diff with `context` lines around each hunk.
    pub fn unified(&self, old_label: &str, new_label: &str, context: usize) -> String {
        let mut out = String::new();
        if self.is_empty() {
            return out;
        }
        let _ = writeln!(out, "--- {}", old_label);
        let _ = writeln!(out, "+++ {}", new_label);

        for (start, end) in self.hunks(context) {
            let (old_before, new_before) = self.position(start);
            let (old_len, new_len) = self.lines[start..end].iter().fold((0, 0), |(o, n), l| {
                match l.kind {
                    LineKind::Context => (o + 1, n + 1),
                    LineKind::Removed => (o + 1, n),
                    LineKind::Added => (o, n + 1),
                }
            });
            let _ = writeln!(
                out,
                "@@ -{} +{} @@",
                range(old_before, old_len),
                range(new_before, new_len)
            );
            for line in &self.lines[start..end] {
                out.push(line.kind.marker());
                match line.text.strip_suffix('\n') {
                    Some(body) => {
                        out.push_str(body.strip_suffix('\r').unwrap_or(body));
                        out.push('\n');
                    }
                    None => {
                        out.push_str(&line.text);
                        out.push_str("\n\\ No newline at end of file\n");
                    }
                }
            }
        }
        out
    }

    /// Half-open index ranges of hunks, merging hunks whose context overlaps.
    fn hunks(&self, context: usize) -> Vec<(usize, usize)> {
        let mut hunks: Vec<(usize, usize)> = Vec::new();
        for (i, line) in self.lines.iter().enumerate() {
            if line.kind == LineKind::Context {
                continue;
            }
            let start = i.saturating_sub(context);
            let end = (i + 1 + context).min(self.lines.len());
            match hunks.last_mut() {
                Some(last) if start <= last.1 => last.1 = end,
                _ => hunks.push((start, end)),
            }
        }
        hunks
    }

    /// Old and new line counts before index `idx`.
    fn position(&self, idx: usize) -> (usize, usize) {
        self.lines[..idx].iter().fold((0, 0), |(o, n), l| match l.kind {
            LineKind::Context => (o + 1, n + 1),
            LineKind::Removed => (o + 1, n),
            LineKind::Added => (o, n + 1),
        })
    }
}

impl<'a> IntoIterator for &'a ChangeSet {
    type Item = &'a DiffLine;
    type IntoIter = std::slice::Iter<'a, DiffLine>;

    fn into_iter(self) -> Self::IntoIter {
        self.lines.iter()
    }
}

fn range(before: usize, len: usize) -> String {
    match len {
        0 => format!("{},0", before),
        1 => format!("{}", before + 1),
        _ => format!("{},{}", before + 1, len),
    }
}

/// Compare `seed` against `current`.
///
/// Uses Myers' algorithm in linear space. Past [`DIFF_TIMEOUT`] the result
/// is still a valid edit script, just not necessarily a minimal one.
pub fn diff(seed: &str, current: &str) -> ChangeSet {
    if seed == current {
        return ChangeSet::default();
    }

    let text_diff = TextDiff::configure()
        .algorithm(Algorithm::Myers)
        .timeout(DIFF_TIMEOUT)
        .diff_lines(seed, current);

    let lines = text_diff
        .iter_all_changes()
        .map(|change| DiffLine {
            kind: match change.tag() {
                ChangeTag::Equal => LineKind::Context,
                ChangeTag::Delete => LineKind::Removed,
                ChangeTag::Insert => LineKind::Added,
            },
            text: change.value().to_string(),
        })
        .collect();

    ChangeSet { lines }
}
