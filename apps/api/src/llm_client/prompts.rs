// Shared prompt fragments.
// Each workflow defines its own prompts.rs alongside it.
// This file contains cross-cutting fragments only.

/// Appended to prompts whose answer is parsed by the structured-output parser.
pub const JSON_ONLY_INSTRUCTION: &str = "\
Respond with the JSON only. Do not add explanations, apologies or markdown code fences.";

/// Fills `{name}` placeholders in a prompt template.
///
/// Single pass: substituted values are never re-scanned, so resume text that
/// happens to contain `{job_description}` stays literal.
/// Placeholders with no matching value are left untouched.
pub fn render(template: &str, values: &[(&str, &str)]) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(open) = rest.find('{') {
        out.push_str(&rest[..open]);
        let after = &rest[open + 1..];
        let substituted = after.find('}').and_then(|close| {
            let key = &after[..close];
            values
                .iter()
                .find(|(k, _)| *k == key)
                .map(|(_, value)| (*value, close))
        });

        match substituted {
            Some((value, close)) => {
                out.push_str(value);
                rest = &after[close + 1..];
            }
            None => {
                out.push('{');
                rest = after;
            }
        }
    }

    out.push_str(rest);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_replaces_every_occurrence() {
        let out = render("{a} and {a} then {b}", &[("a", "x"), ("b", "y")]);
        assert_eq!(out, "x and x then y");
    }

    #[test]
    fn test_render_leaves_unknown_placeholders() {
        let out = render("{known} {unknown}", &[("known", "k")]);
        assert_eq!(out, "k {unknown}");
    }

    #[test]
    fn test_render_does_not_rescan_substituted_values() {
        let out = render("{resume} / {jd}", &[("resume", "see {jd}"), ("jd", "Rust")]);
        assert_eq!(out, "see {jd} / Rust");
    }

    #[test]
    fn test_render_keeps_literal_json_braces() {
        let out = render(r#"{"decision": "{d}"}"#, &[("d", "pass")]);
        assert_eq!(out, r#"{"decision": "pass"}"#);
    }
}
