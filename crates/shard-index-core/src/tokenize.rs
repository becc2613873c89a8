//! Text normalization primitives.
//!
//! Two distinct notions of "token" are used throughout the index:
//!
//! - [`token_count`] counts whitespace-delimited runs and feeds the BM25
//!   document length (`dl`) and the corpus `avgdl`.
//! - [`tokenize`] yields lower-cased ASCII alphanumeric runs and is the only
//!   tokenizer used to build term postings and to parse free-text queries.

use sha2::{Digest, Sha256};

/// Number of whitespace-delimited tokens in `text`.
pub fn token_count(text: &str) -> u64 {
    text.split_whitespace().count() as u64
}

/// Lower-cased `[A-Za-z0-9]+` runs of `text`, in order of appearance.
pub fn tokenize(text: &str) -> Vec<String> {
    text.split(|c: char| !c.is_ascii_alphanumeric())
        .filter(|run| !run.is_empty())
        .map(|run| run.to_ascii_lowercase())
        .collect()
}

/// Lower-case hex SHA-256 of the UTF-8 bytes of `text`.
pub fn content_hash(text: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Same digest over raw bytes (used for auxiliary files such as `index.json`).
pub fn bytes_hash(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    format!("{:x}", hasher.finalize())
}

/// Slug for a heading: lower-cased, non-alphanumeric runs collapsed to `-`.
pub fn slugify(title: &str) -> String {
    let lower = title.to_lowercase();
    let mut slug = String::with_capacity(lower.len());
    let mut pending_dash = false;
    for c in lower.chars() {
        if c.is_ascii_lowercase() || c.is_ascii_digit() {
            if pending_dash && !slug.is_empty() {
                slug.push('-');
            }
            pending_dash = false;
            slug.push(c);
        } else {
            pending_dash = true;
        }
    }
    if slug.is_empty() {
        "section".to_string()
    } else {
        slug
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_count() {
        assert_eq!(token_count("one two three"), 3);
        assert_eq!(token_count("  spaced\tout\n\nlines  "), 3);
        assert_eq!(token_count(""), 0);
    }

    #[test]
    fn test_tokenize() {
        assert_eq!(tokenize("Hello World 123"), vec!["hello", "world", "123"]);
        assert_eq!(tokenize("foo-bar_baz.qux"), vec!["foo", "bar", "baz", "qux"]);
        assert!(tokenize("--- !!").is_empty());
    }

    #[test]
    fn test_tokenize_differs_from_token_count() {
        // "k1=1.5" is one whitespace token but three terms.
        assert_eq!(token_count("k1=1.5"), 1);
        assert_eq!(tokenize("k1=1.5"), vec!["k1", "1", "5"]);
    }

    #[test]
    fn test_content_hash_deterministic() {
        assert_eq!(content_hash("hello world"), content_hash("hello world"));
        assert_ne!(content_hash("hello"), content_hash("world"));
        assert_eq!(content_hash("hello").len(), 64);
        assert_eq!(content_hash("abc"), bytes_hash(b"abc"));
    }

    #[test]
    fn test_content_hash_single_byte_change() {
        assert_ne!(content_hash("Section body.\n"), content_hash("Section body!\n"));
    }

    #[test]
    fn test_slugify() {
        assert_eq!(slugify("When to Use"), "when-to-use");
        assert_eq!(slugify("  API: v2 (beta)  "), "api-v2-beta");
        assert_eq!(slugify("???"), "section");
        assert_eq!(slugify("Überblick"), "berblick");
    }
}
