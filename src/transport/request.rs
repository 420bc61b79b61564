//! Wire request construction.
//!
//! Turns a provider config plus resolved prompt text into the
//! provider-specific endpoint and JSON body. Values substituted into the
//! body template are JSON-string-escaped, so templates stay valid JSON no
//! matter what the code under review contains.

use crate::config::ProviderConfig;
use crate::review::types::CodeContext;

/// A fully built provider request, ready for the transport adapter.
#[derive(Debug, Clone)]
pub struct WireRequest {
    pub endpoint: String,
    pub body: String,
}

/// Build the wire request for one provider.
///
/// The endpoint template may embed `{{model}}` (generation-style APIs put
/// the model in the URL); the body template takes `{{model}}`,
/// `{{prompt}}`, `{{code}}`, `{{language}}`, and `{{system_prompt}}`.
pub fn build_wire_request(
    provider: &ProviderConfig,
    prompt: &str,
    code: &str,
    ctx: &CodeContext,
    system_prompt: &str,
) -> WireRequest {
    let endpoint = provider
        .endpoint_template
        .replace("{{model}}", &provider.model);

    let body = provider
        .request_template
        .replace("{{model}}", &json_escape(&provider.model))
        .replace("{{prompt}}", &json_escape(prompt))
        .replace("{{code}}", &json_escape(code))
        .replace("{{language}}", &json_escape(&ctx.language))
        .replace("{{system_prompt}}", &json_escape(system_prompt));

    WireRequest { endpoint, body }
}

/// Escape a value for splicing between quotes in a JSON template.
fn json_escape(value: &str) -> String {
    let quoted = serde_json::Value::String(value.to_string()).to_string();
    quoted[1..quoted.len() - 1].to_string()
}
