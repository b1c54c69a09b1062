//! Per-violation text surgery.
//!
//! Every transform reads only the line(s) at the reported row and returns a
//! [`PatchPlan`], or `None` when there is nothing safe to do. A plan is never
//! returned for a rewrite that would leave the bytes unchanged, so a
//! diagnostic the tool cannot resolve surfaces as unfixable instead of being
//! "fixed" forever.

use crate::fix::patch::PatchPlan;
use crate::fix::terminator::{LineTerminator, RawLine};
use crate::fix::violation::{Violation, ViolationRecord};

/// Build the rewrite for `record` against the current working-copy lines.
pub fn transform(
    record: &ViolationRecord,
    lines: &[RawLine<'_>],
    terminator: LineTerminator,
) -> Option<PatchPlan> {
    if record.row == 0 || record.row > lines.len() {
        return None;
    }
    let index = record.row - 1;

    match record.kind {
        Violation::BlankLineDeficit { required, found } => {
            let deficit = required.checked_sub(found).filter(|&d| d > 0)?;
            Some(PatchPlan::insert(index, terminator.as_bytes().repeat(deficit)))
        }
        Violation::ExcessBlankLines => {
            let blank = index.checked_sub(1)?;
            if !lines[blank].is_blank() {
                return None;
            }
            Some(PatchPlan::delete(blank))
        }
        Violation::StrayCharacter => rewrite_line(lines, index, None, |text| {
            delete_char(text, record.column.checked_sub(1)?)
        }),
        Violation::MissingWhitespaceBefore => rewrite_line(lines, index, None, |text| {
            insert_space(text, record.column.checked_sub(1)?)
        }),
        Violation::MissingWhitespaceAfter => {
            rewrite_line(lines, index, None, |text| insert_space(text, record.column))
        }
        Violation::RedundantContinuation => {
            rewrite_line(lines, index, Some(terminator), strip_continuation)
        }
        Violation::MalformedCommentMarker => rewrite_line(lines, index, None, |text| {
            normalize_comment(text, record.column.checked_sub(1)?)
        }),
    }
}

/// Replace line `index` with `edit(content)`. The line keeps its own
/// terminator unless `ending` overrides it.
fn rewrite_line(
    lines: &[RawLine<'_>],
    index: usize,
    ending: Option<LineTerminator>,
    edit: impl FnOnce(&str) -> Option<String>,
) -> Option<PatchPlan> {
    let line = lines[index];
    let text = std::str::from_utf8(line.content).ok()?;
    let mut replacement = edit(text)?.into_bytes();
    match ending {
        Some(terminator) => replacement.extend_from_slice(terminator.as_bytes()),
        None => replacement.extend_from_slice(line.terminator),
    }
    if replacement == line.to_bytes() {
        return None;
    }
    Some(PatchPlan::replace(index, replacement))
}

/// Byte offset of the `index`-th character, if the line has that many.
fn char_offset(text: &str, index: usize) -> Option<usize> {
    text.char_indices().nth(index).map(|(offset, _)| offset)
}

fn delete_char(text: &str, index: usize) -> Option<String> {
    let start = char_offset(text, index)?;
    let end = start + text[start..].chars().next()?.len_utf8();
    Some(format!("{}{}", &text[..start], &text[end..]))
}

/// Insert a space before the `index`-th character. Inserting at or past the
/// end of the line would only add trailing whitespace, so it is refused.
fn insert_space(text: &str, index: usize) -> Option<String> {
    let at = char_offset(text, index)?;
    Some(format!("{} {}", &text[..at], &text[at..]))
}

/// Drop a trailing `\` and the whitespace around it.
fn strip_continuation(text: &str) -> Option<String> {
    let stripped = text.trim_end().strip_suffix('\\')?;
    Some(stripped.trim_end().to_string())
}

/// Rewrite the comment starting at character `index` as `# text`.
fn normalize_comment(text: &str, index: usize) -> Option<String> {
    let at = char_offset(text, index)?;
    let comment = &text[at..];
    if !comment.starts_with('#') {
        return None;
    }
    let body = comment.trim_start_matches('#').trim_start();
    let normalized = if body.is_empty() {
        "#".to_string()
    } else {
        format!("# {body}")
    };
    Some(format!("{}{normalized}", &text[..at]))
}
