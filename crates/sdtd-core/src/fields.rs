//! Comma field splitter for console record lines
//!
//! Splits on commas except those inside a parenthesized group, so a
//! position triple like `pos=(1.5, -2.0, 3.25)` stays a single field.

/// Split a record line into trimmed fields.
///
/// The last field is always emitted, even when the line does not end with a
/// separator. An unclosed `(` keeps the rest of the line in the current field.
pub fn split_fields(line: &str) -> Vec<String> {
    let mut fields = Vec::new();
    let mut current = String::new();
    let mut inside = false;

    for ch in line.chars() {
        match ch {
            ',' if !inside => {
                fields.push(current.trim().to_string());
                current.clear();
            }
            '(' => {
                inside = true;
                current.push(ch);
            }
            ')' => {
                inside = false;
                current.push(ch);
            }
            _ => current.push(ch),
        }
    }

    fields.push(current.trim().to_string());
    fields
}
