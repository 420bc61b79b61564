//! Prompt template resolution boundary.
//!
//! The surrounding tool owns its prompt library; the engine only needs a
//! resolver that turns a named template plus a variable map into final
//! prompt text. [`TemplateSet`] is the built-in implementation so the
//! engine works stand-alone; collaborators can supply their own.

use std::collections::HashMap;

/// Resolves a named prompt template against a variable map.
pub trait PromptResolver: Send + Sync {
    fn resolve(&self, name: &str, vars: &HashMap<String, String>) -> anyhow::Result<String>;
}

/// Name of the review template every [`TemplateSet`] starts with.
pub const REVIEW_TEMPLATE: &str = "review";

/// Built-in review instruction template.
///
/// Pins the response contract the normalizer expects: a JSON array of
/// finding objects, nothing else required around it.
const DEFAULT_REVIEW_TEMPLATE: &str = r#"Review the following {{language}} code from `{{file_path}}` ({{total_lines}} lines).

Report every substantive issue you find. Respond with a JSON array in EXACTLY this shape:

```json
[
  {
    "severity": "critical" | "high" | "medium" | "low",
    "category": "security" | "performance" | "maintainability" | "architecture" | "code-smell" | "best-practice",
    "message": "what the issue is",
    "rationale": "why it matters",
    "suggestion": "how to fix it",
    "lineNumber": 42,
    "confidence": 0.9,
    "businessImpact": "low" | "medium" | "high"
  }
]
```

Return an empty array if the code is clean. Skip trivial style nitpicks."#;

/// Plain named-template store with `{{var}}` substitution.
#[derive(Debug, Clone)]
pub struct TemplateSet {
    templates: HashMap<String, String>,
}

impl TemplateSet {
    /// A template set preloaded with the built-in review template.
    pub fn new() -> Self {
        let mut templates = HashMap::new();
        templates.insert(REVIEW_TEMPLATE.to_string(), DEFAULT_REVIEW_TEMPLATE.to_string());
        Self { templates }
    }

    /// Add or replace a named template.
    pub fn insert(&mut self, name: impl Into<String>, template: impl Into<String>) {
        self.templates.insert(name.into(), template.into());
    }
}

impl Default for TemplateSet {
    fn default() -> Self {
        Self::new()
    }
}

impl PromptResolver for TemplateSet {
    fn resolve(&self, name: &str, vars: &HashMap<String, String>) -> anyhow::Result<String> {
        let template = self
            .templates
            .get(name)
            .ok_or_else(|| anyhow::anyhow!("unknown prompt template `{name}`"))?;
        Ok(substitute(template, vars))
    }
}

/// Replace every `{{key}}` placeholder with its value from `vars`.
/// Placeholders with no matching variable are left untouched.
pub(crate) fn substitute(template: &str, vars: &HashMap<String, String>) -> String {
    let mut out = template.to_string();
    for (key, value) in vars {
        out = out.replace(&format!("{{{{{key}}}}}"), value);
    }
    out
}
