//! Consensus and aggregation engine.
//!
//! Pure functions over per-provider finding lists: no I/O, deterministic
//! for a fixed input. Two findings agree when their messages are close in
//! edit distance, or when different reviewers anchor the same category of
//! issue to the same line. Paraphrased reports of one issue usually share
//! the location even when they share no wording.

use std::collections::BTreeMap;

use crate::config::ConsensusParams;

use super::types::{AggregationSummary, Finding};

/// Compute the aggregation summary for one review call.
///
/// Iteration follows the map's provider-id ordering, so parallel and
/// sequential dispatch aggregate identically.
pub fn aggregate(
    results_by_provider: &BTreeMap<String, Vec<Finding>>,
    params: &ConsensusParams,
) -> AggregationSummary {
    let all: Vec<&Finding> = results_by_provider.values().flatten().collect();

    let mut findings_by_severity = BTreeMap::new();
    let mut findings_by_category = BTreeMap::new();
    for f in &all {
        *findings_by_severity.entry(f.severity).or_insert(0) += 1;
        *findings_by_category.entry(f.category).or_insert(0) += 1;
    }

    // Positive-integer floor; 1 (or below) makes every finding consensus.
    let min_count = params.min_consensus_count.max(1);
    let threshold = params.similarity_threshold;

    // A finding is consensus when enough *other* providers each carry at
    // least one similar finding. Evaluated per occurrence: every agreeing
    // provider's phrasing is kept.
    let mut consensus_findings: Vec<Finding> = Vec::new();
    for (provider, findings) in results_by_provider {
        for f in findings {
            let agreeing_others = results_by_provider
                .iter()
                .filter(|(other, _)| *other != provider)
                .filter(|(_, other_findings)| {
                    other_findings.iter().any(|o| similar(f, o, threshold))
                })
                .count();
            if agreeing_others >= min_count - 1 {
                consensus_findings.push(f.clone());
            }
        }
    }

    // Per provider, whatever is not similar to any consensus finding.
    let mut unique_findings_by_provider: BTreeMap<String, Vec<Finding>> = BTreeMap::new();
    for (provider, findings) in results_by_provider {
        let unique: Vec<Finding> = findings
            .iter()
            .filter(|f| !consensus_findings.iter().any(|c| similar(f, c, threshold)))
            .cloned()
            .collect();
        if !unique.is_empty() {
            unique_findings_by_provider.insert(provider.clone(), unique);
        }
    }

    let agreement_score = consensus_findings.len() as f64 / all.len().max(1) as f64;

    AggregationSummary {
        total_findings: all.len(),
        findings_by_severity,
        findings_by_category,
        consensus_findings,
        unique_findings_by_provider,
        agreement_score,
    }
}

/// Whether two findings report the same issue.
///
/// Symmetric: both the location rule and the text rule compare their
/// operands the same way in either order.
pub fn similar(a: &Finding, b: &Finding, threshold: f64) -> bool {
    if let (Some(la), Some(lb)) = (a.line_number, b.line_number) {
        if la == lb && a.category == b.category {
            return true;
        }
    }
    message_similarity(&a.message, &b.message) > threshold
}

/// Normalized similarity of two messages: `(max_len - edit_distance) / max_len`
/// over case-folded, whitespace-collapsed text. Two empty messages are
/// identical (1.0).
pub fn message_similarity(a: &str, b: &str) -> f64 {
    let a = fold(a);
    let b = fold(b);
    let max_len = a.chars().count().max(b.chars().count());
    if max_len == 0 {
        return 1.0;
    }
    (max_len - levenshtein(&a, &b)) as f64 / max_len as f64
}

/// Lowercase and collapse runs of whitespace to single spaces.
fn fold(s: &str) -> String {
    s.to_lowercase().split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Levenshtein distance, two-row dynamic programming.
fn levenshtein(a: &str, b: &str) -> usize {
    let a_chars: Vec<char> = a.chars().collect();
    let b_chars: Vec<char> = b.chars().collect();
    let m = a_chars.len();
    let n = b_chars.len();

    if m == 0 {
        return n;
    }
    if n == 0 {
        return m;
    }

    let mut prev: Vec<usize> = (0..=n).collect();
    let mut curr = vec![0; n + 1];

    for i in 1..=m {
        curr[0] = i;
        for j in 1..=n {
            let cost = if a_chars[i - 1] == b_chars[j - 1] { 0 } else { 1 };
            curr[j] = (prev[j] + 1).min(curr[j - 1] + 1).min(prev[j - 1] + cost);
        }
        std::mem::swap(&mut prev, &mut curr);
    }

    prev[n]
}

// ── Tests ────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::review::types::{BusinessImpact, Category, Severity};

    fn finding(provider: &str, message: &str) -> Finding {
        Finding {
            provider_id: provider.into(),
            severity: Severity::Medium,
            category: Category::CodeSmell,
            message: message.into(),
            rationale: String::new(),
            suggestion: String::new(),
            file_path: "src/main.rs".into(),
            line_number: None,
            line_range: None,
            code_snippet: None,
            confidence: 0.8,
            tags: vec![],
            estimated_fix_time: None,
            business_impact: BusinessImpact::Medium,
        }
    }

    fn at_line(provider: &str, message: &str, line: u32, category: Category) -> Finding {
        let mut f = finding(provider, message);
        f.line_number = Some(line);
        f.category = category;
        f
    }

    fn results(entries: Vec<(&str, Vec<Finding>)>) -> BTreeMap<String, Vec<Finding>> {
        entries
            .into_iter()
            .map(|(k, v)| (k.to_string(), v))
            .collect()
    }

    #[test]
    fn levenshtein_basics() {
        assert_eq!(levenshtein("hello", "hello"), 0);
        assert_eq!(levenshtein("hello", "helo"), 1);
        assert_eq!(levenshtein("hello", "world"), 4);
        assert_eq!(levenshtein("", "abc"), 3);
        assert_eq!(levenshtein("abc", ""), 3);
    }

    #[test]
    fn similarity_folds_case_and_whitespace() {
        assert!((message_similarity("SQL  Injection", "sql injection") - 1.0).abs() < f64::EPSILON);
        assert!((message_similarity("", "") - 1.0).abs() < f64::EPSILON);
        assert_eq!(message_similarity("abc", "xyz"), 0.0);
    }

    #[test]
    fn similar_is_symmetric() {
        let pairs = [
            (finding("a", "unbounded recursion"), finding("b", "unbounded recursion risk")),
            (finding("a", "x"), finding("b", "completely different text")),
            (
                at_line("a", "injection here", 10, Category::Security),
                at_line("b", "totally different words", 10, Category::Security),
            ),
            (
                at_line("a", "one", 10, Category::Security),
                at_line("b", "two", 11, Category::Security),
            ),
        ];
        for (x, y) in &pairs {
            assert_eq!(similar(x, y, 0.7), similar(y, x, 0.7));
        }
    }

    #[test]
    fn same_line_same_category_agrees_despite_wording() {
        let a = at_line("a", "user input reaches the query unescaped", 10, Category::Security);
        let b = at_line("b", "possible SQL injection", 10, Category::Security);
        assert!(similar(&a, &b, 0.7));

        // Same line, different category: only the text rule applies.
        let c = at_line("c", "slow loop", 10, Category::Performance);
        assert!(!similar(&a, &c, 0.7));
    }

    #[test]
    fn consensus_two_of_three_keeps_both_phrasings() {
        let input = results(vec![
            ("a", vec![at_line("a", "tainted input in query", 10, Category::Security)]),
            ("b", vec![at_line("b", "SQL injection possible", 10, Category::Security)]),
            ("c", vec![]),
        ]);
        let summary = aggregate(&input, &ConsensusParams::default());

        assert_eq!(summary.consensus_findings.len(), 2);
        let providers: Vec<&str> = summary
            .consensus_findings
            .iter()
            .map(|f| f.provider_id.as_str())
            .collect();
        assert_eq!(providers, vec!["a", "b"]);
        // Never double-counted as unique.
        assert!(summary.unique_findings_by_provider.is_empty());
        assert!((summary.agreement_score - 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn lone_finding_is_unique_not_consensus() {
        let input = results(vec![
            ("a", vec![finding("a", "god object in session manager")]),
            ("b", vec![]),
        ]);
        let summary = aggregate(&input, &ConsensusParams::default());

        assert!(summary.consensus_findings.is_empty());
        assert_eq!(summary.unique_findings_by_provider["a"].len(), 1);
        assert_eq!(summary.agreement_score, 0.0);
        assert_eq!(summary.total_findings, 1);
    }

    #[test]
    fn empty_input_scores_zero() {
        let summary = aggregate(&BTreeMap::new(), &ConsensusParams::default());
        assert_eq!(summary.total_findings, 0);
        assert_eq!(summary.agreement_score, 0.0);
        assert!(summary.consensus_findings.is_empty());
        assert!(summary.unique_findings_by_provider.is_empty());

        let all_empty = results(vec![("a", vec![]), ("b", vec![])]);
        let summary = aggregate(&all_empty, &ConsensusParams::default());
        assert_eq!(summary.agreement_score, 0.0);
    }

    #[test]
    fn agreement_score_stays_in_bounds() {
        let input = results(vec![
            ("a", vec![finding("a", "shared issue wording"), finding("a", "only mine")]),
            ("b", vec![finding("b", "shared issue wording")]),
        ]);
        let summary = aggregate(&input, &ConsensusParams::default());
        assert!(summary.agreement_score >= 0.0 && summary.agreement_score <= 1.0);
        // 2 of 3 findings agree.
        assert!((summary.agreement_score - 2.0 / 3.0).abs() < 1e-9);
    }

    #[test]
    fn min_consensus_one_marks_everything_consensus() {
        let input = results(vec![("a", vec![finding("a", "anything at all")])]);
        let params = ConsensusParams {
            min_consensus_count: 1,
            similarity_threshold: 0.7,
        };
        let summary = aggregate(&input, &params);
        assert_eq!(summary.consensus_findings.len(), 1);
        assert!(summary.unique_findings_by_provider.is_empty());

        // Zero is floored to one rather than rejected.
        let params = ConsensusParams {
            min_consensus_count: 0,
            similarity_threshold: 0.7,
        };
        assert_eq!(aggregate(&input, &params).consensus_findings.len(), 1);
    }

    #[test]
    fn higher_quorum_needs_more_providers() {
        let input = results(vec![
            ("a", vec![finding("a", "shared issue wording")]),
            ("b", vec![finding("b", "shared issue wording")]),
            ("c", vec![finding("c", "shared issue wording")]),
        ]);

        let quorum = |n| ConsensusParams {
            min_consensus_count: n,
            similarity_threshold: 0.7,
        };
        assert_eq!(aggregate(&input, &quorum(3)).consensus_findings.len(), 3);
        assert_eq!(aggregate(&input, &quorum(4)).consensus_findings.len(), 0);
    }

    #[test]
    fn severity_and_category_counts() {
        let mut high = finding("a", "one");
        high.severity = Severity::High;
        high.category = Category::Security;
        let input = results(vec![
            ("a", vec![high, finding("a", "two")]),
            ("b", vec![finding("b", "three")]),
        ]);
        let summary = aggregate(&input, &ConsensusParams::default());
        assert_eq!(summary.findings_by_severity[&Severity::High], 1);
        assert_eq!(summary.findings_by_severity[&Severity::Medium], 2);
        assert_eq!(summary.findings_by_category[&Category::Security], 1);
        assert_eq!(summary.findings_by_category[&Category::CodeSmell], 2);
    }

    #[test]
    fn threshold_is_respected() {
        // "cache misses hurt" vs "cache misses hurts": one edit apart.
        let a = finding("a", "cache misses hurt");
        let b = finding("b", "cache misses hurts");
        assert!(similar(&a, &b, 0.7));
        assert!(!similar(&a, &b, 0.99));
    }
}
