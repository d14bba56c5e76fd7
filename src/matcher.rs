use crate::record::{CompanyName, MatchResult, NewsRecord};
use crate::reference::ReferenceSet;
use std::collections::BTreeSet;

/// Minimum number of mentions before a company counts as covered by an article.
pub const DEFAULT_MIN_OCCURRENCES: usize = 2;

/// Non-overlapping occurrences of `needle` in `haystack`. Both are expected lowercased.
pub fn count_occurrences(haystack: &str, needle: &str) -> usize {
    if needle.is_empty() {
        return 0;
    }
    haystack.matches(needle).count()
}

/// Companies whose name or alias appears at least `min_occurrences` times in `content`.
///
/// Matching is a literal, case-insensitive substring count with no word boundaries,
/// so a short name also matches inside longer words.
pub fn match_companies(
    content: &str,
    reference: &ReferenceSet,
    min_occurrences: usize,
) -> BTreeSet<CompanyName> {
    let mut matched = BTreeSet::new();
    if content.is_empty() || reference.is_empty() {
        return matched;
    }

    let lowered = content.to_lowercase();
    for (term, company) in reference.terms() {
        if matched.contains(company) {
            continue;
        }
        if count_occurrences(&lowered, term) >= min_occurrences {
            matched.insert(company.clone());
        }
    }
    matched
}

pub fn match_record(
    record: &NewsRecord,
    reference: &ReferenceSet,
    min_occurrences: usize,
) -> MatchResult {
    MatchResult {
        record_id: record.id.clone(),
        matched: match_companies(&record.content, reference, min_occurrences),
    }
}
