fn leading_whitespace(line: &str) -> usize {
    line.chars().take_while(|c| *c == ' ' || *c == '\t').count()
}

/// Shifts a block of lines so its least-indented line sits at `indent` columns, keeping relative
/// indentation. Trailing blank lines are dropped and the result always ends with a line break.
pub fn reindent(block: &str, indent: usize) -> String {
    let lines: Vec<&str> = block.lines().collect();
    let last = match lines.iter().rposition(|l| !l.trim().is_empty()) {
        Some(i) => i,
        None => return String::new(),
    };
    let lines = &lines[..=last];

    let common = lines.iter()
        .filter(|l| !l.trim().is_empty())
        .map(|l| leading_whitespace(l))
        .min()
        .unwrap_or(0);

    let pad = " ".repeat(indent);
    let mut out = String::with_capacity(block.len() + lines.len() * indent);
    for line in lines.iter().skip_while(|l| l.trim().is_empty()) {
        if line.trim().is_empty() {
            out.push('\n');
            continue;
        }
        out.push_str(&pad);
        /* common is a count of single-byte whitespace characters */
        out.push_str(line[common..].trim_end());
        out.push('\n');
    }
    out
}

/// Bytes at the front of `a` and at the back of `b` that two strings share, for checking that
/// an edit stayed where it was supposed to.
#[cfg(test)]
pub fn common_affixes(a: &str, b: &str) -> (usize, usize) {
    let prefix = a.bytes().zip(b.bytes()).take_while(|(x, y)| x == y).count();
    let max_suffix = a.len().min(b.len()) - prefix;
    let suffix = a.bytes().rev().zip(b.bytes().rev()).take(max_suffix).take_while(|(x, y)| x == y).count();
    (prefix, suffix)
}
