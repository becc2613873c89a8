//! Okapi BM25 over a shard's term postings.
//!
//! For each query term with posting list `P` (`df = |P|`):
//!
//! ```text
//! idf   = ln(1 + (N - df + 0.5) / (df + 0.5))
//! score += idf * tf * (k1 + 1) / (tf + k1 * (1 - b + b * dl / avgdl))
//! ```
//!
//! where `N = doc_count`, `dl` is the section's `token_count` floored at 1,
//! and `avgdl` is floored at 1 as well. Repeated query terms contribute
//! repeatedly.

use std::collections::{BTreeMap, HashMap};

use crate::index::{Bm25Stats, Posting};
use crate::tokenize::tokenize;

/// Inverse document frequency of a term occurring in `df` of `n` sections.
pub fn idf(n: u64, df: usize) -> f64 {
    let n = n as f64;
    let df = df as f64;
    (1.0 + (n - df + 0.5) / (df + 0.5)).ln()
}

/// Contribution of one posting to a section's score.
pub fn term_score(idf: f64, tf: u32, dl: u64, stats: &Bm25Stats) -> f64 {
    let tf = tf as f64;
    let dl = dl.max(1) as f64;
    let avgdl = if stats.avgdl > 0.0 { stats.avgdl } else { 1.0 };
    let denom = tf + stats.k1 * (1.0 - stats.b + stats.b * (dl / avgdl));
    idf * (tf * (stats.k1 + 1.0) / denom)
}

/// Rank slugs for `query`.
///
/// `doc_lengths` maps slug → `token_count`; postings whose slug is unknown
/// are ignored. Only nonzero scores are returned, sorted descending; ties
/// keep the order in which slugs were first scored.
pub fn rank(
    term_index: &BTreeMap<String, Vec<Posting>>,
    stats: &Bm25Stats,
    doc_lengths: &HashMap<&str, u64>,
    query: &str,
) -> Vec<(String, f64)> {
    let mut order: Vec<(String, f64)> = Vec::new();
    let mut position: HashMap<String, usize> = HashMap::new();

    for term in tokenize(query) {
        let Some(postings) = term_index.get(&term) else {
            continue;
        };
        if postings.is_empty() {
            continue;
        }
        let term_idf = idf(stats.doc_count, postings.len());
        for (slug, tf) in postings {
            let Some(&dl) = doc_lengths.get(slug.as_str()) else {
                continue;
            };
            let score = term_score(term_idf, *tf, dl, stats);
            match position.get(slug) {
                Some(&i) => order[i].1 += score,
                None => {
                    position.insert(slug.clone(), order.len());
                    order.push((slug.clone(), score));
                }
            }
        }
    }

    order.retain(|(_, score)| *score != 0.0);
    // stable sort keeps first-scored order among equal scores
    order.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
    order
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stats(doc_count: u64, avgdl: f64) -> Bm25Stats {
        Bm25Stats {
            k1: 1.5,
            b: 0.75,
            doc_count,
            avgdl,
        }
    }

    #[test]
    fn test_idf_formula() {
        let expected = (1.0f64 + (10.0 - 2.0 + 0.5) / (2.0 + 0.5)).ln();
        assert!((idf(10, 2) - expected).abs() < 1e-12);
        // idf stays positive even when every section has the term
        assert!(idf(3, 3) > 0.0);
    }

    #[test]
    fn test_term_score_formula() {
        let s = stats(4, 10.0);
        let got = term_score(1.0, 3, 20, &s);
        let expected = 3.0 * 2.5 / (3.0 + 1.5 * (1.0 - 0.75 + 0.75 * 2.0));
        assert!((got - expected).abs() < 1e-12);
    }

    #[test]
    fn test_zero_length_section_floored() {
        let s = stats(1, 1.0);
        assert_eq!(term_score(1.0, 1, 0, &s), term_score(1.0, 1, 1, &s));
    }

    #[test]
    fn test_monotonic_in_tf() {
        let s = stats(5, 12.0);
        let mut last = 0.0;
        for tf in 1..50 {
            let score = term_score(idf(5, 2), tf, 12, &s);
            assert!(score >= last, "score decreased at tf={}", tf);
            last = score;
        }
    }

    #[test]
    fn test_rank_orders_and_accumulates() {
        let mut term_index = BTreeMap::new();
        term_index.insert(
            "configuration".to_string(),
            vec![("details".to_string(), 3)],
        );
        term_index.insert(
            "options".to_string(),
            vec![("intro".to_string(), 1), ("details".to_string(), 1)],
        );
        let lengths: HashMap<&str, u64> = [("intro", 10), ("details", 10)].into_iter().collect();
        let ranked = rank(&term_index, &stats(2, 10.0), &lengths, "Configuration options");
        let slugs: Vec<&str> = ranked.iter().map(|(s, _)| s.as_str()).collect();
        assert_eq!(slugs, vec!["details", "intro"]);
        assert!(ranked[0].1 > ranked[1].1);
    }

    #[test]
    fn test_rank_ties_keep_insertion_order() {
        let mut term_index = BTreeMap::new();
        term_index.insert(
            "shared".to_string(),
            vec![("b".to_string(), 1), ("a".to_string(), 1)],
        );
        let lengths: HashMap<&str, u64> = [("a", 5), ("b", 5)].into_iter().collect();
        let ranked = rank(&term_index, &stats(2, 5.0), &lengths, "shared");
        let slugs: Vec<&str> = ranked.iter().map(|(s, _)| s.as_str()).collect();
        assert_eq!(slugs, vec!["b", "a"]);
    }

    #[test]
    fn test_rank_unknown_terms_empty() {
        let term_index = BTreeMap::new();
        let lengths = HashMap::new();
        assert!(rank(&term_index, &stats(0, 1.0), &lengths, "nothing here").is_empty());
        assert!(rank(&term_index, &stats(0, 1.0), &lengths, "  ").is_empty());
    }
}
