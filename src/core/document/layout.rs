//! core::document::layout
//!
//! Line-level index of a block-style YAML text, used to apply edits to the
//! original text instead of re-serializing the whole tree.
//!
//! Only the shapes an operator typically writes by hand are indexed: block
//! mappings whose keys sit one per line. Anything else (flow collections,
//! block scalars, sequences, anchors, multi-line scalars) is treated as an
//! opaque region that belongs to the key above it. Callers must verify the
//! patched text and fall back to canonical output when a patch is refused
//! or does not reproduce the expected tree.

use serde_yaml::{Mapping, Value};

/// One `key: value` line.
#[derive(Debug, Clone)]
struct Entry {
    /// Full key path, or `None` when some key on the way is not a string.
    path: Option<Vec<String>>,
    /// Line index of the key.
    line: usize,
    /// Column of the key.
    indent: usize,
    /// Byte range of the inline value, if any.
    value: Option<(usize, usize)>,
    /// Last content line belonging to this entry.
    end: usize,
}

#[derive(Debug)]
struct Frame {
    indent: usize,
    entry: Option<usize>,
    path: Option<Vec<String>>,
    /// Lines nested deeper than this frame are not addressable.
    opaque: bool,
    /// `key:` with nothing inline; a `- item` may follow at the same column.
    bare_key: bool,
}

/// Parsed key line.
#[derive(Debug, PartialEq)]
struct KeyLine {
    name: Option<String>,
    value: Option<(usize, usize)>,
}

/// Index over the lines of a document.
#[derive(Debug)]
pub(super) struct Layout<'a> {
    lines: Vec<&'a str>,
    entries: Vec<Entry>,
    last_content: Option<usize>,
    newline: &'static str,
}

impl<'a> Layout<'a> {
    /// Index `text`, or `None` if it uses constructs the editor does not handle.
    pub(super) fn scan(text: &'a str) -> Option<Self> {
        let lines: Vec<&str> = text.split_inclusive('\n').collect();
        let newline = if text.contains("\r\n") { "\r\n" } else { "\n" };

        let mut entries: Vec<Entry> = Vec::new();
        let mut stack: Vec<Frame> = Vec::new();
        let mut last_content = None;
        let mut seen_content = false;

        for (i, raw) in lines.iter().enumerate() {
            let content = raw.trim_end_matches(['\n', '\r']);
            let trimmed = content.trim_start_matches(' ');
            if trimmed.is_empty() || trimmed.starts_with('#') {
                continue;
            }
            let indent = content.len() - trimmed.len();
            let is_item = trimmed == "-" || trimmed.starts_with("- ");

            while let Some(top) = stack.last() {
                if indent > top.indent || (indent == top.indent && is_item && top.bare_key) {
                    break;
                }
                stack.pop();
            }

            for frame in &stack {
                if let Some(idx) = frame.entry {
                    entries[idx].end = i;
                }
            }
            last_content = Some(i);

            if stack.last().is_some_and(|top| top.opaque) {
                continue;
            }

            if !seen_content && indent == 0 && trimmed.trim_end() == "---" {
                seen_content = true;
                continue;
            }
            seen_content = true;

            if trimmed.starts_with('\t')
                || (indent == 0 && (trimmed.starts_with("---") || trimmed.starts_with("...")))
                || trimmed.starts_with('%')
            {
                return None;
            }

            if is_item {
                // A sequence directly at the root is not a mapping document.
                if stack.is_empty() {
                    return None;
                }
                stack.push(Frame {
                    indent,
                    entry: None,
                    path: None,
                    opaque: true,
                    bare_key: false,
                });
                continue;
            }

            let key = parse_key_line(trimmed)?;
            let parent_path = match stack.last() {
                Some(frame) => frame.path.clone(),
                None => Some(Vec::new()),
            };
            let path = match (parent_path, key.name) {
                (Some(mut p), Some(name)) => {
                    p.push(name);
                    Some(p)
                }
                _ => None,
            };

            let idx = entries.len();
            entries.push(Entry {
                path: path.clone(),
                line: i,
                indent,
                value: key.value.map(|(s, e)| (indent + s, indent + e)),
                end: i,
            });
            stack.push(Frame {
                indent,
                entry: Some(idx),
                path,
                opaque: key.value.is_some(),
                bare_key: key.value.is_none(),
            });
        }

        Some(Self {
            lines,
            entries,
            last_content,
            newline,
        })
    }

    fn find(&self, path: &[String]) -> Option<&Entry> {
        self.entries
            .iter()
            .find(|e| e.path.as_deref() == Some(path))
    }

    /// Replace the value of an existing key.
    pub(super) fn replace(&self, path: &[String], value: &Value) -> Option<String> {
        let entry = self.find(path)?;

        if let (Some((start, end)), Some(rendered)) = (entry.value, render_inline(value)) {
            if entry.end == entry.line {
                let line = self.lines[entry.line];
                let spliced = format!("{}{}{}", &line[..start], rendered, &line[end..]);
                return Some(self.splice(entry.line, entry.line, &spliced));
            }
        }

        let key = path.last()?;
        let block = render_block(key, value, entry.indent, self.newline)?;
        let block = self.terminate(entry.end, block);
        Some(self.splice(entry.line, entry.end, &block))
    }

    /// Insert `missing[0]` (holding `value` nested under the remaining
    /// segments) into the mapping at `ancestor`.
    pub(super) fn insert(
        &self,
        ancestor: &[String],
        missing: &[String],
        value: &Value,
    ) -> Option<String> {
        let (first, rest) = missing.split_first()?;
        let nested = rest.iter().rev().fold(value.clone(), |acc, segment| {
            let mut map = Mapping::new();
            map.insert(Value::String(segment.clone()), acc);
            Value::Mapping(map)
        });

        let (after, indent) = if ancestor.is_empty() {
            let indent = self.entries.first().map_or(0, |e| e.indent);
            (self.last_content, indent)
        } else {
            let parent = self.find(ancestor)?;
            if parent.value.is_some() {
                return None;
            }
            let indent = self
                .entries
                .iter()
                .find(|e| {
                    e.path.as_ref().is_some_and(|p| {
                        p.len() == ancestor.len() + 1 && p.starts_with(ancestor)
                    })
                })
                .map_or(parent.indent + 2, |child| child.indent);
            (Some(parent.end), indent)
        };

        let block = render_block(first, &nested, indent, self.newline)?;
        Some(match after {
            Some(line) => {
                let mut out: String = self.lines[..=line].concat();
                if !out.ends_with('\n') {
                    out.push_str(self.newline);
                }
                out.push_str(&block);
                out.push_str(&self.lines[line + 1..].concat());
                out
            }
            None => {
                let mut out: String = self.lines.concat();
                if !out.is_empty() && !out.ends_with('\n') {
                    out.push_str(self.newline);
                }
                out.push_str(&block);
                out
            }
        })
    }

    /// Drop the trailing newline of `block` if the replaced range had none.
    fn terminate(&self, last: usize, mut block: String) -> String {
        if !self.lines[last].ends_with('\n') {
            let trimmed = block.trim_end_matches(['\n', '\r']).len();
            block.truncate(trimmed);
        }
        block
    }

    /// Replace lines `first..=last` with `replacement`.
    fn splice(&self, first: usize, last: usize, replacement: &str) -> String {
        let mut out: String = self.lines[..first].concat();
        out.push_str(replacement);
        out.push_str(&self.lines[last + 1..].concat());
        out
    }
}

/// Render a value that fits after `key: ` on one line.
fn render_inline(value: &Value) -> Option<String> {
    match value {
        Value::Mapping(m) if !m.is_empty() => return None,
        Value::Sequence(s) if !s.is_empty() => return None,
        Value::Tagged(_) => return None,
        _ => {}
    }
    let yaml = serde_yaml::to_string(value).ok()?;
    let line = yaml.strip_suffix('\n')?;
    if line.contains('\n') || line.starts_with('|') || line.starts_with('>') {
        return None;
    }
    Some(line.to_string())
}

/// Render `key: value` as block lines at the given column.
fn render_block(key: &str, value: &Value, indent: usize, newline: &str) -> Option<String> {
    let mut map = Mapping::new();
    map.insert(Value::String(key.to_string()), value.clone());
    let yaml = serde_yaml::to_string(&Value::Mapping(map)).ok()?;
    let pad = " ".repeat(indent);

    let mut out = String::new();
    for line in yaml.lines() {
        if !line.is_empty() {
            out.push_str(&pad);
            out.push_str(line);
        }
        out.push_str(newline);
    }
    Some(out)
}

/// Parse a (left-trimmed) `key: value` line. Offsets are relative to `s`.
fn parse_key_line(s: &str) -> Option<KeyLine> {
    let first = *s.as_bytes().first()?;
    let (name, colon) = match first {
        b'"' | b'\'' => {
            let close = closing_quote(s)?;
            let after = s[close + 1..].trim_start_matches(' ');
            if !after.starts_with(':') {
                return None;
            }
            let colon = s.len() - after.len();
            if !matches!(s.as_bytes().get(colon + 1), None | Some(b' ')) {
                return None;
            }
            let name = match serde_yaml::from_str::<Value>(&s[..=close]) {
                Ok(Value::String(name)) => Some(name),
                _ => None,
            };
            (name, colon)
        }
        b'?' | b'[' | b'{' | b'&' | b'*' | b'!' | b'|' | b'>' | b'@' | b'`' => return None,
        _ => {
            let colon = plain_colon(s)?;
            let token = s[..colon].trim_end();
            if token.is_empty() {
                return None;
            }
            let name = match serde_yaml::from_str::<Value>(token) {
                Ok(Value::String(name)) if name == token => Some(name),
                _ => None,
            };
            (name, colon)
        }
    };

    let start = colon + 1 + (s[colon + 1..].len() - s[colon + 1..].trim_start_matches(' ').len());
    let rest = &s[start..];
    if rest.is_empty() || rest.starts_with('#') {
        return Some(KeyLine { name, value: None });
    }

    let end = match rest.as_bytes()[0] {
        b'"' | b'\'' => match closing_quote(rest) {
            Some(close) => {
                let tail = &rest[close + 1..];
                let t = tail.trim_start_matches(' ');
                if t.is_empty() || (t.starts_with('#') && t.len() < tail.len()) {
                    start + close + 1
                } else {
                    s.len()
                }
            }
            None => s.len(),
        },
        _ => match rest.find(" #") {
            Some(pos) => start + pos,
            None => s.len(),
        },
    };
    let end = start + s[start..end].trim_end().len();

    Some(KeyLine {
        name,
        value: Some((start, end)),
    })
}

/// Position of the `:` that ends a plain key.
fn plain_colon(s: &str) -> Option<usize> {
    let bytes = s.as_bytes();
    for (i, &b) in bytes.iter().enumerate() {
        match b {
            b'#' if i > 0 && bytes[i - 1] == b' ' => return None,
            b':' if matches!(bytes.get(i + 1), None | Some(b' ')) => return Some(i),
            _ => {}
        }
    }
    None
}

/// Index of the quote closing the quoted scalar that starts `s`.
fn closing_quote(s: &str) -> Option<usize> {
    let bytes = s.as_bytes();
    let quote = *bytes.first()?;
    let mut i = 1;
    while i < bytes.len() {
        match bytes[i] {
            b'\\' if quote == b'"' => i += 2,
            b if b == quote => {
                if quote == b'\'' && bytes.get(i + 1) == Some(&b'\'') {
                    i += 2;
                } else {
                    return Some(i);
                }
            }
            _ => i += 1,
        }
    }
    None
}
