//! Token approximation and the line-based limiter/merge helpers shared by
//! both chunking strategies (spec §4.2, open question on `approxTokens`).

/// `max(1, ceil(chars/4))`. Kept as the exact heuristic named in spec §9's
/// open questions so reimplementations preserve chunk boundaries.
pub fn approx_tokens(text: &str) -> usize {
    let chars = text.chars().count();
    std::cmp::max(1, chars.div_ceil(4))
}

/// Split `text` into lines, keeping the line terminator out of each entry.
fn lines(text: &str) -> Vec<&str> {
    text.lines().collect()
}

/// Split an over-long piece of text into chunks of at most `max_tokens`,
/// each with an overlap of approximately `overlap_tokens` carried over from
/// the tail of the previous chunk. Splits occur on line boundaries; ensures
/// every output chunk has at least `min_tokens` unless it is the only piece.
pub fn limit_by_lines(
    text: &str,
    max_tokens: usize,
    min_tokens: usize,
    overlap_tokens: usize,
) -> Vec<String> {
    let all_lines = lines(text);
    if all_lines.is_empty() {
        return Vec::new();
    }

    let mut out = Vec::new();
    let mut current: Vec<&str> = Vec::new();
    let mut current_tokens = 0usize;

    let mut i = 0;
    while i < all_lines.len() {
        let line = all_lines[i];
        let line_tokens = approx_tokens(line);

        if current_tokens + line_tokens > max_tokens && !current.is_empty() {
            out.push(current.join("\n"));

            // carry over the tail of the previous chunk as overlap
            let mut overlap_lines = Vec::new();
            let mut overlap_count = 0usize;
            for l in current.iter().rev() {
                let t = approx_tokens(l);
                if overlap_count + t > overlap_tokens {
                    break;
                }
                overlap_lines.push(*l);
                overlap_count += t;
            }
            overlap_lines.reverse();
            current = overlap_lines;
            current_tokens = overlap_count;
            continue;
        }

        current.push(line);
        current_tokens += line_tokens;
        i += 1;
    }

    if !current.is_empty() {
        out.push(current.join("\n"));
    }

    // Ensure the last piece meets the minimum by folding it into its
    // predecessor when there is one to fold into.
    if out.len() > 1 {
        let last_tokens = approx_tokens(out.last().unwrap());
        if last_tokens < min_tokens {
            let last = out.pop().unwrap();
            let prev = out.pop().unwrap();
            out.push(format!("{prev}\n{last}"));
        }
    }

    out
}

/// Merge consecutive strings while the running total stays under `cap`, only
/// folding a piece into the accumulator when the piece itself is under
/// `small_threshold` (spec §4.2 "merge consecutive chunks under 200 tokens
/// while the combined result stays under 600").
pub fn merge_small_runs(pieces: Vec<String>, small_threshold: usize, cap: usize) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();

    for piece in pieces {
        let piece_tokens = approx_tokens(&piece);
        if let Some(last) = out.last_mut() {
            let last_tokens = approx_tokens(last);
            if last_tokens < small_threshold && last_tokens + piece_tokens <= cap {
                last.push_str("\n\n");
                last.push_str(&piece);
                continue;
            }
        }
        out.push(piece);
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn approx_tokens_matches_heuristic() {
        assert_eq!(approx_tokens(""), 1);
        assert_eq!(approx_tokens("a"), 1);
        assert_eq!(approx_tokens("abcd"), 1);
        assert_eq!(approx_tokens("abcde"), 2);
        assert_eq!(approx_tokens(&"x".repeat(600)), 150);
    }

    #[test]
    fn limit_by_lines_keeps_short_text_as_one_piece() {
        let out = limit_by_lines("line one\nline two", 600, 40, 60);
        assert_eq!(out.len(), 1);
    }

    #[test]
    fn limit_by_lines_splits_long_text_with_overlap() {
        let text = (0..400)
            .map(|i| format!("line number {i} with some filler words"))
            .collect::<Vec<_>>()
            .join("\n");
        let out = limit_by_lines(&text, 600, 40, 60);
        assert!(out.len() >= 2);
        for piece in &out {
            assert!(approx_tokens(piece) <= 600 + 60);
        }
    }

    #[test]
    fn merge_small_runs_combines_under_cap() {
        let pieces = vec!["a".repeat(40), "b".repeat(40), "c".repeat(3000)];
        let out = merge_small_runs(pieces, 200, 600);
        assert_eq!(out.len(), 2);
    }
}
