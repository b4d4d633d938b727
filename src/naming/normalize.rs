//! Pure string helpers behind destination names and duplicate keys.

use once_cell::sync::Lazy;
use regex::Regex;
use unicode_normalization::UnicodeNormalization;

/// Length of the hash suffix in hex digits (12 bits).
pub const HASH_LEN: usize = 3;

static DISALLOWED: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[^A-Za-z0-9._-]").expect("file name whitelist regex"));
static UNDERSCORE_RUNS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"_{2,}").expect("underscore run regex"));

/// Decomposes `s` and drops every code point outside ASCII, so accented
/// letters keep their base letter and other scripts disappear.
pub fn fold_to_ascii(s: &str) -> String {
    s.nfd().filter(|c| c.is_ascii()).collect()
}

/// A file-system-safe version of `s`: ASCII folded, spaces and periods
/// turned into underscores, anything outside `[A-Za-z0-9._-]` removed, and
/// underscore runs collapsed. Applying it twice changes nothing.
pub fn clean_file_name(s: &str) -> String {
    let folded = fold_to_ascii(s).replace(|c| c == ' ' || c == '.', "_");
    let allowed = DISALLOWED.replace_all(&folded, "");
    UNDERSCORE_RUNS.replace_all(&allowed, "_").into_owned()
}

/// First [`HASH_LEN`] hex digits of the MD5 of the ASCII-folded,
/// space-joined `fields`.
pub fn short_hash(fields: &[&str]) -> String {
    let input = fold_to_ascii(&fields.join(" "));
    let digest = format!("{:x}", md5::compute(input.as_bytes()));
    digest[..HASH_LEN].to_string()
}

/// Grouping key for near-duplicate tracks: the lower-cased ASCII letters of
/// the title followed by those of the artist.
pub fn fuzzy_key(title: &str, artist: &str) -> String {
    fold_to_ascii(&format!("{}{}", title, artist))
        .chars()
        .filter(|c| c.is_ascii_alphabetic())
        .map(|c| c.to_ascii_lowercase())
        .collect()
}
