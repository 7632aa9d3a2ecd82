//! Physical to logical lines.

use devlib_core::DeckLine;

fn strip_comment(text: &str) -> &str {
    text.split_once(';').map_or(text, |(code, _)| code)
}

/// Split deck text into the title and its logical lines.
///
/// Leading blank lines are skipped and the first remaining line is the
/// title. `*` lines and `;` tails are comments, a leading `+` continues
/// the previous line, and `.end` stops reading. Line numbers are 1-based
/// and refer to the first physical line.
pub fn logical_lines(text: &str) -> (String, Vec<DeckLine>) {
    let mut physical = text
        .lines()
        .enumerate()
        .skip_while(|(_, l)| l.trim().is_empty());
    let title = physical
        .next()
        .map(|(_, l)| l.trim().to_string())
        .unwrap_or_default();

    let mut lines: Vec<DeckLine> = Vec::new();
    for (i, raw) in physical {
        let text = strip_comment(raw).trim();
        if text.is_empty() || text.starts_with('*') {
            continue;
        }
        if let Some(rest) = text.strip_prefix('+') {
            match lines.last_mut() {
                Some(prev) => {
                    prev.text.push(' ');
                    prev.text.push_str(rest.trim());
                }
                None => {
                    let mut line = DeckLine::new(i + 1, rest.trim());
                    line.diag.warn(format!(
                        "line {}: continuation without a preceding line",
                        i + 1
                    ));
                    lines.push(line);
                }
            }
            continue;
        }
        if text.eq_ignore_ascii_case(".end") {
            break;
        }
        lines.push(DeckLine::new(i + 1, text));
    }
    (title, lines)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_title_comments_and_continuations() {
        let text = "\nMy circuit\n* a comment\nv1 1 0 ; supply\n+ dc 5\n\nr1 1 0 1k\n.end\nv2 2 0 1\n";
        let (title, lines) = logical_lines(text);
        assert_eq!(title, "My circuit");
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0].text, "v1 1 0 dc 5");
        assert_eq!(lines[0].number, 4);
        assert_eq!(lines[1].text, "r1 1 0 1k");
    }

    #[test]
    fn test_orphan_continuation_warns() {
        let (_, lines) = logical_lines("title\n+ v1 1 0 1\n");
        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0].diag.warnings.len(), 1);
    }

    #[test]
    fn test_empty_deck() {
        let (title, lines) = logical_lines("");
        assert!(title.is_empty());
        assert!(lines.is_empty());
    }
}
