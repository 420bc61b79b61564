//! Response normalizer.
//!
//! Models wrap their JSON in prose, markdown fences, and half-followed
//! format instructions. This module digs the first well-formed JSON array
//! out of raw model output and coerces each element into a canonical
//! [`Finding`], defaulting every missing field. Parse failures degrade to
//! "no findings from this provider" plus a warning, never an error, so a
//! garbled reviewer cannot poison the rest of the fan-out.

use serde_json::Value;

use super::types::{BusinessImpact, Category, CodeContext, Finding, Severity};

/// Default confidence when the reviewer omits or garbles the field.
const DEFAULT_CONFIDENCE: f64 = 0.8;

/// Non-fatal issues encountered while normalizing one provider's output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NormalizeWarning {
    /// No JSON array substring found anywhere in the raw text.
    NoJsonArray,
    /// An element of the array was not a usable finding object.
    SkippedElement { index: usize, reason: String },
}

impl std::fmt::Display for NormalizeWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NoJsonArray => write!(f, "no JSON array found in response"),
            Self::SkippedElement { index, reason } => {
                write!(f, "skipped element {index}: {reason}")
            }
        }
    }
}

/// Extract findings from raw model output.
///
/// Returns the findings plus the warning channel; the pair is the whole
/// outcome, and this function never fails.
pub fn normalize(
    raw: &str,
    provider_id: &str,
    ctx: &CodeContext,
) -> (Vec<Finding>, Vec<NormalizeWarning>) {
    let Some(items) = first_json_array(raw) else {
        tracing::warn!(provider = provider_id, "no JSON array in model response");
        return (vec![], vec![NormalizeWarning::NoJsonArray]);
    };

    let mut findings = Vec::new();
    let mut warnings = Vec::new();

    for (index, item) in items.iter().enumerate() {
        let Some(obj) = item.as_object() else {
            warnings.push(NormalizeWarning::SkippedElement {
                index,
                reason: "not an object".into(),
            });
            continue;
        };

        let Some(message) = get_str(obj, &["message", "description"]).filter(|m| !m.is_empty())
        else {
            warnings.push(NormalizeWarning::SkippedElement {
                index,
                reason: "missing message".into(),
            });
            continue;
        };

        findings.push(Finding {
            provider_id: provider_id.into(),
            severity: get_str(obj, &["severity"])
                .map(|s| Severity::from_str_lossy(&s))
                .unwrap_or(Severity::Medium),
            category: get_str(obj, &["category"])
                .map(|s| Category::from_str_lossy(&s))
                .unwrap_or(Category::CodeSmell),
            message,
            rationale: get_str(obj, &["rationale"]).unwrap_or_default(),
            suggestion: get_str(obj, &["suggestion"]).unwrap_or_default(),
            file_path: get_str(obj, &["filePath", "file_path"])
                .unwrap_or_else(|| ctx.file_path.clone()),
            line_number: get_u32(obj, &["lineNumber", "line_number", "line"]),
            line_range: get_range(obj, &["lineRange", "line_range"]),
            code_snippet: get_str(obj, &["codeSnippet", "code_snippet"]),
            confidence: get_f64(obj, &["confidence"])
                .map(|c| c.clamp(0.0, 1.0))
                .unwrap_or(DEFAULT_CONFIDENCE),
            tags: get_string_list(obj, &["tags"]),
            estimated_fix_time: get_str(obj, &["estimatedFixTime", "estimated_fix_time"]),
            business_impact: get_str(obj, &["businessImpact", "business_impact"])
                .map(|s| BusinessImpact::from_str_lossy(&s))
                .unwrap_or(BusinessImpact::Medium),
        });
    }

    (findings, warnings)
}

/// Locate and parse the first well-formed JSON array substring.
///
/// Scans for `[`, finds the balanced closing bracket (string literals and
/// escapes honored), and attempts a parse; the first slice that parses as
/// an array wins. Markdown fences need no special casing, the scan walks
/// straight through them.
fn first_json_array(raw: &str) -> Option<Vec<Value>> {
    let bytes = raw.as_bytes();
    let mut start = 0;
    while let Some(offset) = raw[start..].find('[') {
        let open = start + offset;
        if let Some(end) = balanced_array_end(bytes, open) {
            if let Ok(Value::Array(items)) = serde_json::from_str(&raw[open..=end]) {
                return Some(items);
            }
        }
        start = open + 1;
    }
    None
}

/// Index of the `]` balancing the `[` at `open`, or `None` if unbalanced.
fn balanced_array_end(bytes: &[u8], open: usize) -> Option<usize> {
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;
    for (i, &b) in bytes.iter().enumerate().skip(open) {
        if in_string {
            if escaped {
                escaped = false;
            } else if b == b'\\' {
                escaped = true;
            } else if b == b'"' {
                in_string = false;
            }
            continue;
        }
        match b {
            b'"' => in_string = true,
            b'[' => depth += 1,
            b']' => {
                depth -= 1;
                if depth == 0 {
                    return Some(i);
                }
            }
            _ => {}
        }
    }
    None
}

// ── Field accessors ──────────────────────────────────────────────

fn get_str(obj: &serde_json::Map<String, Value>, keys: &[&str]) -> Option<String> {
    keys.iter()
        .find_map(|k| obj.get(*k))
        .and_then(Value::as_str)
        .map(str::to_string)
}

fn get_u32(obj: &serde_json::Map<String, Value>, keys: &[&str]) -> Option<u32> {
    keys.iter()
        .find_map(|k| obj.get(*k))
        .and_then(Value::as_u64)
        .and_then(|n| u32::try_from(n).ok())
}

fn get_f64(obj: &serde_json::Map<String, Value>, keys: &[&str]) -> Option<f64> {
    keys.iter().find_map(|k| obj.get(*k)).and_then(Value::as_f64)
}

fn get_range(obj: &serde_json::Map<String, Value>, keys: &[&str]) -> Option<(u32, u32)> {
    let arr = keys.iter().find_map(|k| obj.get(*k))?.as_array()?;
    match (arr.first()?.as_u64(), arr.get(1)?.as_u64()) {
        (Some(a), Some(b)) => Some((u32::try_from(a).ok()?, u32::try_from(b).ok()?)),
        _ => None,
    }
}

fn get_string_list(obj: &serde_json::Map<String, Value>, keys: &[&str]) -> Vec<String> {
    keys.iter()
        .find_map(|k| obj.get(*k))
        .and_then(Value::as_array)
        .map(|arr| {
            arr.iter()
                .filter_map(Value::as_str)
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}

// ── Tests ────────────────────────────────────────────────────────
