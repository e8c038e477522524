//! Database queries

pub mod branch;
pub mod company;
pub mod customer;
pub mod operator;
pub mod visit;

/// Build an ILIKE pattern matching `text` anywhere, with LIKE wildcards escaped.
pub fn contains_pattern(text: &str) -> String {
    let mut pattern = String::with_capacity(text.len() + 2);
    pattern.push('%');
    for c in text.chars() {
        if matches!(c, '%' | '_' | '\\') {
            pattern.push('\\');
        }
        pattern.push(c);
    }
    pattern.push('%');
    pattern
}
