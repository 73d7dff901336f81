use crate::intent::parse_save;
use crate::text::to_plain_spaces;

/// Breaks an inbound message into ordered, independent command lines.
///
/// Lines are split on `\n` / `\r\n`. Within a line, a `#` that opens a
/// complete save command (`#key - value`, up to the next `#`) also starts a
/// new line, so several saves pasted back to back are each recognized. A `#`
/// that does not open a save (for example `ref #123`) stays inside its line.
pub fn split_lines(message: &str) -> Vec<String> {
    message
        .split('\n')
        .flat_map(split_pasted_saves)
        .map(to_plain_spaces)
        .filter(|line| !line.is_empty())
        .collect()
}

fn split_pasted_saves(line: &str) -> Vec<&str> {
    let line = line.strip_suffix('\r').unwrap_or(line);
    let hashes: Vec<usize> = line.match_indices('#').map(|(index, _)| index).collect();

    let mut pieces = Vec::new();
    let mut start = 0;
    for (position, &index) in hashes.iter().enumerate() {
        if index == 0 || line[..index].trim().is_empty() {
            continue;
        }
        let segment_end = hashes.get(position + 1).copied().unwrap_or(line.len());
        if parse_save(&to_plain_spaces(&line[index..segment_end])).is_some() {
            pieces.push(&line[start..index]);
            start = index;
        }
    }
    pieces.push(&line[start..]);
    pieces
}

#[cfg(test)]
mod tests {
    use super::split_lines;

    #[test]
    fn splits_on_newlines_and_drops_blank_lines() {
        let lines = split_lines("#a - 1\r\n\n   \n?a\n-b");
        assert_eq!(lines, vec!["#a - 1", "?a", "-b"]);
    }

    #[test]
    fn pasted_saves_without_newline_become_separate_lines() {
        assert_eq!(split_lines("#a - 1#b - 2"), vec!["#a - 1", "#b - 2"]);
        assert_eq!(split_lines("#a - 1 #b — 2 #c – 3"), vec!["#a - 1", "#b — 2", "#c – 3"]);
    }

    #[test]
    fn hash_inside_a_value_is_not_a_split_point() {
        assert_eq!(split_lines("#pedido - ref #123"), vec!["#pedido - ref #123"]);
        assert_eq!(
            split_lines("#pedido - ref #123 #wifi - clave"),
            vec!["#pedido - ref #123", "#wifi - clave"]
        );
    }

    #[test]
    fn text_before_a_pasted_save_is_kept_as_its_own_line() {
        assert_eq!(split_lines("hola #a - 1"), vec!["hola", "#a - 1"]);
    }

    #[test]
    fn lines_are_space_normalized_in_order() {
        let lines = split_lines("  ?\u{00A0}wifi  \n\u{3000}?*  2");
        assert_eq!(lines, vec!["? wifi", "?* 2"]);
    }

    #[test]
    fn empty_message_yields_no_lines() {
        assert!(split_lines("").is_empty());
        assert!(split_lines(" \n \r\n").is_empty());
    }
}
