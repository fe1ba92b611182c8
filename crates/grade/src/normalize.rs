use alloc::string::String;

/// Operators that swallow the whitespace around them.
const OPERATORS: [char; 7] = ['=', '+', '-', '*', '/', '(', ')'];

fn is_operator(c: char) -> bool {
    OPERATORS.contains(&c)
}

/// Canonicalizes a free-text answer for loose comparison.
///
/// The input is lowercased and trimmed, every whitespace run becomes one space, and
/// any space touching an operator is dropped. A missing answer normalizes to `""`.
/// Runs in a single linear pass over the input.
pub fn normalize<'a>(raw: impl Into<Option<&'a str>>) -> String {
    let Some(raw) = raw.into() else {
        return String::new();
    };

    let lowered = raw.to_lowercase();
    let mut out = String::with_capacity(lowered.len());
    let mut gap = false;
    for c in lowered.trim().chars() {
        if c.is_whitespace() {
            gap = true;
            continue;
        }
        if gap && !is_operator(c) && !out.ends_with(is_operator) {
            out.push(' ');
        }
        gap = false;
        out.push(c);
    }
    out
}
