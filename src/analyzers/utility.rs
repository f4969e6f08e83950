/// Average of `sum` over `count`. Returns 0.0 for an empty group.
pub fn average(sum: i64, count: usize) -> f64 {
    if count == 0 {
        return 0.0;
    }
    sum as f64 / count as f64
}

/// Appends every maximal run of ASCII digits in `text` to `out`.
pub fn push_digit_runs(text: &str, out: &mut String) {
    out.extend(text.chars().filter(char::is_ascii_digit));
}
