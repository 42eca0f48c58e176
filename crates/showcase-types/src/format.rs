//! Small display helpers shared by the API and client consumers.

const SIZE_UNITS: [&str; 5] = ["Bytes", "KB", "MB", "GB", "TB"];

/// Avatar initials for a display name.
///
/// Two or more words give the first letter of the first and last word; a
/// single word gives its first two letters. Missing or blank names give `"U"`.
pub fn get_initials<'a>(name: impl Into<Option<&'a str>>) -> String {
    let Some(name) = name.into() else {
        return "U".to_string();
    };

    let words: Vec<&str> = name.split_whitespace().collect();
    let initials: String = match words.as_slice() {
        [] => return "U".to_string(),
        [single] => single.chars().take(2).collect(),
        [first, .., last] => first.chars().take(1).chain(last.chars().take(1)).collect(),
    };

    initials.to_uppercase()
}

/// Human readable byte size with binary (1024) steps and up to two decimals.
pub fn format_file_size(bytes: u64) -> String {
    if bytes == 0 {
        return "0 Bytes".to_string();
    }

    let mut unit = 0;
    let mut divisor = 1u64;
    while unit + 1 < SIZE_UNITS.len() && bytes >= divisor * 1024 {
        divisor *= 1024;
        unit += 1;
    }

    let value = bytes as f64 / divisor as f64;
    let rounded = format!("{:.2}", value);
    let trimmed = rounded.trim_end_matches('0').trim_end_matches('.');
    format!("{} {}", trimmed, SIZE_UNITS[unit])
}

/// URL slug: lowercase ASCII alphanumerics separated by single dashes.
pub fn slugify(input: &str) -> String {
    let mut slug = String::with_capacity(input.len());
    let mut pending_dash = false;

    for c in input.chars() {
        if c.is_ascii_alphanumeric() {
            if pending_dash && !slug.is_empty() {
                slug.push('-');
            }
            pending_dash = false;
            slug.push(c.to_ascii_lowercase());
        } else {
            pending_dash = true;
        }
    }

    slug
}
