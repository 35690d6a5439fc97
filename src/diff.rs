//! Longest-matching-blocks sequence comparison.
//!
//! [`SequenceMatcher`] finds the longest contiguous matching block, then recurses on the
//! pieces to its left and right (Ratcliff/Obershelp). Its [`ratio`](SequenceMatcher::ratio)
//! is `2·M / T` over those blocks, and its grouped opcodes drive [`unified_diff`].
//! Patch rewards depend on both, so the block selection and tie-breaking here are exact:
//! the leftmost longest match in `a`, then the leftmost in `b`.

use std::collections::HashMap;
use std::hash::Hash;

/// Sequences at least this long drop "popular" elements from the index when autojunk is on.
const AUTOJUNK_MIN_LEN: usize = 200;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Match {
    pub a: usize,
    pub b: usize,
    pub size: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tag {
    Equal,
    Replace,
    Delete,
    Insert,
}

/// `a[a_start..a_end]` becomes `b[b_start..b_end]` under `tag`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Opcode {
    pub tag: Tag,
    pub a_start: usize,
    pub a_end: usize,
    pub b_start: usize,
    pub b_end: usize,
}

impl Opcode {
    fn new(tag: Tag, a_start: usize, a_end: usize, b_start: usize, b_end: usize) -> Self {
        Self {
            tag,
            a_start,
            a_end,
            b_start,
            b_end,
        }
    }
}

pub struct SequenceMatcher<'a, T> {
    a: &'a [T],
    b: &'a [T],
    b2j: HashMap<&'a T, Vec<usize>>,
}

impl<'a, T: Hash + Eq> SequenceMatcher<'a, T> {
    /// Matcher that indexes every element of `b`.
    pub fn new(a: &'a [T], b: &'a [T]) -> Self {
        Self::with_autojunk(a, b, false)
    }

    /// With `autojunk`, elements making up more than 1% of a long `b` are not indexed.
    pub fn with_autojunk(a: &'a [T], b: &'a [T], autojunk: bool) -> Self {
        let mut b2j: HashMap<&'a T, Vec<usize>> = HashMap::new();
        for (j, elt) in b.iter().enumerate() {
            b2j.entry(elt).or_default().push(j);
        }

        if autojunk && b.len() >= AUTOJUNK_MIN_LEN {
            let limit = b.len() / 100 + 1;
            b2j.retain(|_, indices| indices.len() <= limit);
        }

        Self { a, b, b2j }
    }

    /// Longest block with `a[i..i+k] == b[j..j+k]` inside the given ranges.
    pub fn find_longest_match(&self, alo: usize, ahi: usize, blo: usize, bhi: usize) -> Match {
        let (a, b) = (self.a, self.b);
        let (mut best_i, mut best_j, mut best_size) = (alo, blo, 0);

        // j2len[j] = length of the match ending at a[i-1] and b[j]
        let mut j2len: HashMap<usize, usize> = HashMap::new();
        for (i, elt) in a.iter().enumerate().take(ahi).skip(alo) {
            let mut next: HashMap<usize, usize> = HashMap::new();
            if let Some(indices) = self.b2j.get(elt) {
                for &j in indices {
                    if j < blo {
                        continue;
                    }
                    if j >= bhi {
                        break;
                    }
                    let k = j
                        .checked_sub(1)
                        .and_then(|prev| j2len.get(&prev))
                        .copied()
                        .unwrap_or(0)
                        + 1;
                    next.insert(j, k);
                    if k > best_size {
                        best_i = i + 1 - k;
                        best_j = j + 1 - k;
                        best_size = k;
                    }
                }
            }
            j2len = next;
        }

        // Unindexed elements can still extend a block on either side.
        while best_i > alo && best_j > blo && a[best_i - 1] == b[best_j - 1] {
            best_i -= 1;
            best_j -= 1;
            best_size += 1;
        }
        while best_i + best_size < ahi
            && best_j + best_size < bhi
            && a[best_i + best_size] == b[best_j + best_size]
        {
            best_size += 1;
        }

        Match {
            a: best_i,
            b: best_j,
            size: best_size,
        }
    }

    /// Non-adjacent matching blocks in order, terminated by a zero-size sentinel.
    pub fn matching_blocks(&self) -> Vec<Match> {
        let (la, lb) = (self.a.len(), self.b.len());
        let mut queue = vec![(0, la, 0, lb)];
        let mut blocks = Vec::new();

        while let Some((alo, ahi, blo, bhi)) = queue.pop() {
            let m = self.find_longest_match(alo, ahi, blo, bhi);
            if m.size == 0 {
                continue;
            }
            blocks.push(m);
            if alo < m.a && blo < m.b {
                queue.push((alo, m.a, blo, m.b));
            }
            if m.a + m.size < ahi && m.b + m.size < bhi {
                queue.push((m.a + m.size, ahi, m.b + m.size, bhi));
            }
        }
        blocks.sort();

        let mut merged: Vec<Match> = Vec::with_capacity(blocks.len() + 1);
        for m in blocks {
            match merged.last_mut() {
                Some(last) if last.a + last.size == m.a && last.b + last.size == m.b => {
                    last.size += m.size;
                }
                _ => merged.push(m),
            }
        }
        merged.push(Match {
            a: la,
            b: lb,
            size: 0,
        });
        merged
    }

    pub fn opcodes(&self) -> Vec<Opcode> {
        let (mut i, mut j) = (0, 0);
        let mut codes = Vec::new();

        for m in self.matching_blocks() {
            let tag = match (i < m.a, j < m.b) {
                (true, true) => Some(Tag::Replace),
                (true, false) => Some(Tag::Delete),
                (false, true) => Some(Tag::Insert),
                (false, false) => None,
            };
            if let Some(tag) = tag {
                codes.push(Opcode::new(tag, i, m.a, j, m.b));
            }
            i = m.a + m.size;
            j = m.b + m.size;
            if m.size > 0 {
                codes.push(Opcode::new(Tag::Equal, m.a, i, m.b, j));
            }
        }
        codes
    }

    /// Change hunks with up to `context` equal elements around each change.
    pub fn grouped_opcodes(&self, context: usize) -> Vec<Vec<Opcode>> {
        let mut codes = self.opcodes();
        if codes.is_empty() {
            codes.push(Opcode::new(Tag::Equal, 0, 1, 0, 1));
        }

        if let Some(first) = codes.first_mut().filter(|c| c.tag == Tag::Equal) {
            first.a_start = first.a_start.max(first.a_end.saturating_sub(context));
            first.b_start = first.b_start.max(first.b_end.saturating_sub(context));
        }
        if let Some(last) = codes.last_mut().filter(|c| c.tag == Tag::Equal) {
            last.a_end = last.a_end.min(last.a_start + context);
            last.b_end = last.b_end.min(last.b_start + context);
        }

        let mut groups = Vec::new();
        let mut group = Vec::new();
        for mut code in codes {
            if code.tag == Tag::Equal && code.a_end - code.a_start > 2 * context {
                group.push(Opcode::new(
                    Tag::Equal,
                    code.a_start,
                    code.a_end.min(code.a_start + context),
                    code.b_start,
                    code.b_end.min(code.b_start + context),
                ));
                groups.push(std::mem::take(&mut group));
                code.a_start = code.a_start.max(code.a_end.saturating_sub(context));
                code.b_start = code.b_start.max(code.b_end.saturating_sub(context));
            }
            group.push(code);
        }
        if !(group.is_empty() || (group.len() == 1 && group[0].tag == Tag::Equal)) {
            groups.push(group);
        }
        groups
    }

    /// `2·M / T`, where `M` counts matched elements and `T` is the combined length.
    pub fn ratio(&self) -> f64 {
        let total = self.a.len() + self.b.len();
        if total == 0 {
            return 1.0;
        }
        let matches: usize = self.matching_blocks().iter().map(|m| m.size).sum();
        2.0 * matches as f64 / total as f64
    }
}

/// Character-level similarity of `a` against `b`, with every character indexed.
pub fn similarity(a: &str, b: &str) -> f64 {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    SequenceMatcher::new(&a, &b).ratio()
}

/// Hunks of a line diff, without the file header, joined by `\n` with no trailing newline.
///
/// Empty when the line sequences are identical.
pub fn unified_diff(before: &str, after: &str, context: usize) -> String {
    let before = split_lines(before);
    let after = split_lines(after);
    let matcher = SequenceMatcher::with_autojunk(&before, &after, true);

    let mut out: Vec<String> = Vec::new();
    for group in matcher.grouped_opcodes(context) {
        let (Some(first), Some(last)) = (group.first(), group.last()) else {
            continue;
        };
        out.push(format!(
            "@@ -{} +{} @@",
            hunk_range(first.a_start, last.a_end),
            hunk_range(first.b_start, last.b_end)
        ));

        for code in &group {
            if code.tag == Tag::Equal {
                out.extend(before[code.a_start..code.a_end].iter().map(|l| format!(" {l}")));
                continue;
            }
            if matches!(code.tag, Tag::Replace | Tag::Delete) {
                out.extend(before[code.a_start..code.a_end].iter().map(|l| format!("-{l}")));
            }
            if matches!(code.tag, Tag::Replace | Tag::Insert) {
                out.extend(after[code.b_start..code.b_end].iter().map(|l| format!("+{l}")));
            }
        }
    }
    out.join("\n")
}

fn hunk_range(start: usize, stop: usize) -> String {
    let length = stop - start;
    match length {
        0 => format!("{start},0"),
        1 => format!("{}", start + 1),
        _ => format!("{},{}", start + 1, length),
    }
}

/// Splits on every line boundary a text editor would recognise (`\r\n` counts once).
pub fn split_lines(text: &str) -> Vec<&str> {
    let mut lines = Vec::new();
    let mut start = 0;
    let mut chars = text.char_indices().peekable();

    while let Some((i, c)) = chars.next() {
        let is_break = matches!(
            c,
            '\n' | '\r'
                | '\u{0b}'
                | '\u{0c}'
                | '\u{1c}'
                | '\u{1d}'
                | '\u{1e}'
                | '\u{85}'
                | '\u{2028}'
                | '\u{2029}'
        );
        if !is_break {
            continue;
        }
        lines.push(&text[start..i]);
        let mut end = i + c.len_utf8();
        if c == '\r' {
            if let Some(&(j, '\n')) = chars.peek() {
                chars.next();
                end = j + 1;
            }
        }
        start = end;
    }
    if start < text.len() {
        lines.push(&text[start..]);
    }
    lines
}
