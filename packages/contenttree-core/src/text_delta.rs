//! Reversible, length-bounded text deltas, plus a display-oriented rendering
//! of the same character diff for history views.
//!
//! A delta transforms the *current* (newer) text back into the older text:
//! `apply_delta(new, make_delta(old, new)) == old`. Deltas are strings so
//! they can sit in a patch next to literal values; the `"@@ "` marker
//! distinguishes them. `encode` only stores a delta when it is shorter than
//! the old value, so history never spends more on a changed field than
//! storing it verbatim would.
//!
//! Wire format after the marker: tab-separated ops over character counts.
//! `=n` copies n characters of the current text, `-text` drops exactly that
//! text from the current position (verified on application), `+text` inserts
//! text. Inserted and dropped text percent-escapes `%`, tab, CR and LF.

use crate::error::{Error, Result};
use crate::value::Scalar;

/// Prefix that marks a stored string as a delta rather than a literal.
pub const DELTA_MARKER: &str = "@@ ";

const OP_SEPARATOR: char = '\t';

/// Search ceiling for the shortest-edit-script pass. Beyond it the delta
/// degrades to a whole-text replacement, which `encode`'s length gate then
/// usually rejects in favor of the literal value.
const MAX_EDIT_DISTANCE: usize = 1024;

#[derive(Clone, Copy, PartialEq, Eq)]
enum Edit {
    Keep(char),
    Drop(char),
    Insert(char),
}

enum DeltaOp {
    Keep(usize),
    Drop(String),
    Insert(String),
}

/// True when a stored scalar string carries a delta.
pub fn is_delta(text: &str) -> bool {
    text.starts_with(DELTA_MARKER)
}

/// Build a delta that recovers `old` from `new`.
pub fn make_delta(old: &str, new: &str) -> String {
    let old_chars: Vec<char> = old.chars().collect();
    let new_chars: Vec<char> = new.chars().collect();
    let (prefix, suffix) = common_affixes(&new_chars, &old_chars);
    let current = &new_chars[prefix..new_chars.len() - suffix];
    let target = &old_chars[prefix..old_chars.len() - suffix];

    let mut ops: Vec<DeltaOp> = Vec::new();
    if prefix > 0 {
        ops.push(DeltaOp::Keep(prefix));
    }
    match shortest_edits(current, target) {
        Some(edits) => collect_ops(&edits, &mut ops),
        None => {
            // Texts too dissimilar for a minimal script; replace wholesale.
            if !current.is_empty() {
                ops.push(DeltaOp::Drop(current.iter().collect()));
            }
            if !target.is_empty() {
                ops.push(DeltaOp::Insert(target.iter().collect()));
            }
        }
    }
    if suffix > 0 {
        ops.push(DeltaOp::Keep(suffix));
    }

    let mut out = String::from(DELTA_MARKER);
    for (i, op) in ops.iter().enumerate() {
        if i > 0 {
            out.push(OP_SEPARATOR);
        }
        match op {
            DeltaOp::Keep(n) => out.push_str(&format!("={n}")),
            DeltaOp::Drop(text) => {
                out.push('-');
                out.push_str(&escape(text));
            }
            DeltaOp::Insert(text) => {
                out.push('+');
                out.push_str(&escape(text));
            }
        }
    }
    out
}

/// Apply a delta to the current text, recovering the older text.
///
/// Fails with `CorruptDelta` whenever the delta and the text disagree:
/// missing marker, malformed ops, dropped text that does not match, or a
/// script that does not consume the current text exactly.
pub fn apply_delta(current: &str, delta: &str) -> Result<String> {
    let body = delta
        .strip_prefix(DELTA_MARKER)
        .ok_or_else(|| Error::CorruptDelta("missing delta marker".into()))?;
    let chars: Vec<char> = current.chars().collect();
    let mut pos = 0usize;
    let mut out = String::with_capacity(current.len());

    if !body.is_empty() {
        for op in body.split(OP_SEPARATOR) {
            let (tag, rest) = op.split_at(op.len().min(1));
            match tag {
                "=" => {
                    let n: usize = rest
                        .parse()
                        .map_err(|_| Error::CorruptDelta(format!("bad copy count \"{rest}\"")))?;
                    if pos + n > chars.len() {
                        return Err(Error::CorruptDelta(
                            "copy runs past the end of the current text".into(),
                        ));
                    }
                    out.extend(&chars[pos..pos + n]);
                    pos += n;
                }
                "-" => {
                    let expected = unescape(rest)?;
                    for want in expected.chars() {
                        match chars.get(pos) {
                            Some(have) if *have == want => pos += 1,
                            _ => {
                                return Err(Error::CorruptDelta(
                                    "dropped text does not match the current text".into(),
                                ));
                            }
                        }
                    }
                }
                "+" => out.push_str(&unescape(rest)?),
                _ => {
                    return Err(Error::CorruptDelta(format!("unknown op \"{op}\"")));
                }
            }
        }
    }

    if pos != chars.len() {
        return Err(Error::CorruptDelta(
            "delta does not span the current text".into(),
        ));
    }
    Ok(out)
}

/// Store the change from `old` to `new`: a delta when that is strictly
/// smaller than the old value, the literal old value otherwise.
pub fn encode(old: &str, new: &str) -> Scalar {
    let delta = make_delta(old, new);
    if delta.len() < old.len() {
        Scalar::Str(delta)
    } else {
        Scalar::Str(old.to_string())
    }
}

/// Render the change from `before` to `after` as an HTML fragment with
/// `<ins class="diff">` / `<del class="diff">` markers. Display only; never
/// stored and not reversible.
pub fn mark_changes(before: &str, after: &str) -> String {
    let before_chars: Vec<char> = before.chars().collect();
    let after_chars: Vec<char> = after.chars().collect();
    let (prefix, suffix) = common_affixes(&before_chars, &after_chars);
    let old_mid = &before_chars[prefix..before_chars.len() - suffix];
    let new_mid = &after_chars[prefix..after_chars.len() - suffix];

    let mut out = String::new();
    push_equal(&mut out, &before_chars[..prefix]);
    match shortest_edits(old_mid, new_mid) {
        Some(edits) => {
            let mut run = String::new();
            let mut kind: Option<u8> = None;
            for edit in edits {
                let (k, ch) = match edit {
                    Edit::Keep(c) => (0u8, c),
                    Edit::Drop(c) => (1u8, c),
                    Edit::Insert(c) => (2u8, c),
                };
                if kind != Some(k) {
                    flush_run(&mut out, kind, &run);
                    run.clear();
                    kind = Some(k);
                }
                run.push(ch);
            }
            flush_run(&mut out, kind, &run);
        }
        None => {
            flush_run(&mut out, Some(1), &old_mid.iter().collect::<String>());
            flush_run(&mut out, Some(2), &new_mid.iter().collect::<String>());
        }
    }
    push_equal(&mut out, &before_chars[before_chars.len() - suffix..]);
    out
}

fn push_equal(out: &mut String, chars: &[char]) {
    if !chars.is_empty() {
        out.push_str(&html_escape(&chars.iter().collect::<String>()));
    }
}

fn flush_run(out: &mut String, kind: Option<u8>, run: &str) {
    if run.is_empty() {
        return;
    }
    match kind {
        Some(0) => out.push_str(&html_escape(run)),
        Some(1) => {
            out.push_str("<del class=\"diff\">");
            out.push_str(&html_escape(run));
            out.push_str("</del>");
        }
        Some(2) => {
            out.push_str("<ins class=\"diff\">");
            out.push_str(&html_escape(run));
            out.push_str("</ins>");
        }
        _ => {}
    }
}

fn html_escape(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('\n', "<br />")
}

fn common_affixes(a: &[char], b: &[char]) -> (usize, usize) {
    let mut prefix = 0;
    while prefix < a.len() && prefix < b.len() && a[prefix] == b[prefix] {
        prefix += 1;
    }
    let mut suffix = 0;
    while suffix < a.len() - prefix && suffix < b.len() - prefix
        && a[a.len() - 1 - suffix] == b[b.len() - 1 - suffix]
    {
        suffix += 1;
    }
    (prefix, suffix)
}

fn collect_ops(edits: &[Edit], ops: &mut Vec<DeltaOp>) {
    let mut i = 0;
    while i < edits.len() {
        match edits[i] {
            Edit::Keep(_) => {
                let mut n = 0;
                while i < edits.len() && matches!(edits[i], Edit::Keep(_)) {
                    n += 1;
                    i += 1;
                }
                ops.push(DeltaOp::Keep(n));
            }
            Edit::Drop(_) => {
                let mut text = String::new();
                while let Some(Edit::Drop(c)) = edits.get(i) {
                    text.push(*c);
                    i += 1;
                }
                ops.push(DeltaOp::Drop(text));
            }
            Edit::Insert(_) => {
                let mut text = String::new();
                while let Some(Edit::Insert(c)) = edits.get(i) {
                    text.push(*c);
                    i += 1;
                }
                ops.push(DeltaOp::Insert(text));
            }
        }
    }
}

/// Myers shortest-edit-script between `a` (the current text) and `b` (the
/// target text). `Drop` consumes from `a`, `Insert` produces from `b`.
/// Returns `None` when the edit distance exceeds `MAX_EDIT_DISTANCE`.
fn shortest_edits(a: &[char], b: &[char]) -> Option<Vec<Edit>> {
    let n = a.len();
    let m = b.len();
    let max = n + m;
    if max == 0 {
        return Some(Vec::new());
    }
    let cap = MAX_EDIT_DISTANCE.min(max);
    let offset = max as isize;
    let mut v = vec![0usize; 2 * max + 2];
    // trace[d] snapshots the diagonals written in round d - 1 (parity d - 1),
    // which is exactly what backtracking through round d needs.
    let mut trace: Vec<Vec<usize>> = Vec::new();
    let mut found: Option<usize> = None;

    'search: for d in 0..=cap {
        let d_i = d as isize;
        let mut snapshot = Vec::with_capacity(d);
        let mut k = -(d_i - 1);
        while d > 0 && k <= d_i - 1 {
            snapshot.push(v[(k + offset) as usize]);
            k += 2;
        }
        trace.push(snapshot);

        let mut k = -d_i;
        while k <= d_i {
            let ki = (k + offset) as usize;
            let mut x = if k == -d_i || (k != d_i && v[ki - 1] < v[ki + 1]) {
                v[ki + 1]
            } else {
                v[ki - 1] + 1
            };
            let mut y = (x as isize - k) as usize;
            while x < n && y < m && a[x] == b[y] {
                x += 1;
                y += 1;
            }
            v[ki] = x;
            if x >= n && y >= m {
                found = Some(d);
                break 'search;
            }
            k += 2;
        }
    }

    let d_final = found?;
    let mut edits: Vec<Edit> = Vec::new();
    let mut x = n as isize;
    let mut y = m as isize;
    for d in (1..=d_final).rev() {
        let d_i = d as isize;
        let snapshot = &trace[d];
        let get = |kk: isize| snapshot[((kk + d_i - 1) / 2) as usize] as isize;
        let k = x - y;
        let prev_k = if k == -d_i || (k != d_i && get(k - 1) < get(k + 1)) {
            k + 1
        } else {
            k - 1
        };
        let prev_x = get(prev_k);
        let prev_y = prev_x - prev_k;
        while x > prev_x && y > prev_y {
            edits.push(Edit::Keep(a[(x - 1) as usize]));
            x -= 1;
            y -= 1;
        }
        if x == prev_x {
            edits.push(Edit::Insert(b[(y - 1) as usize]));
        } else {
            edits.push(Edit::Drop(a[(x - 1) as usize]));
        }
        x = prev_x;
        y = prev_y;
    }
    while x > 0 && y > 0 {
        edits.push(Edit::Keep(a[(x - 1) as usize]));
        x -= 1;
        y -= 1;
    }
    edits.reverse();
    Some(edits)
}

fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '%' => out.push_str("%25"),
            '\t' => out.push_str("%09"),
            '\n' => out.push_str("%0A"),
            '\r' => out.push_str("%0D"),
            _ => out.push(ch),
        }
    }
    out
}

fn unescape(text: &str) -> Result<String> {
    let mut out = String::with_capacity(text.len());
    let mut chars = text.chars();
    while let Some(ch) = chars.next() {
        if ch == '%' {
            let (Some(hi), Some(lo)) = (chars.next(), chars.next()) else {
                return Err(Error::CorruptDelta("truncated escape sequence".into()));
            };
            let byte = u8::from_str_radix(&format!("{hi}{lo}"), 16)
                .map_err(|_| Error::CorruptDelta(format!("bad escape sequence \"%{hi}{lo}\"")))?;
            out.push(byte as char);
        } else {
            out.push(ch);
        }
    }
    Ok(out)
}
