use serde_json::{Map, Value};

use crate::template::placeholders::extract_placeholder_names;
use crate::MailbatchError;

/// Strict Handlebars renderer shared by every row of a run.
///
/// Output is never HTML-escaped: plaintext bodies must stay verbatim and HTML
/// templates are trusted operator input.
pub struct TemplateRenderer {
    hbs: handlebars::Handlebars<'static>,
}

impl Default for TemplateRenderer {
    fn default() -> Self {
        Self::new()
    }
}

impl TemplateRenderer {
    pub fn new() -> Self {
        let mut hbs = handlebars::Handlebars::new();
        hbs.set_strict_mode(true);
        hbs.register_escape_fn(handlebars::no_escape);
        Self { hbs }
    }

    /// Render `template` for `field` against one row's variables.
    ///
    /// Every placeholder must be present in `variables`; the error lists all
    /// missing names rather than the first one Handlebars trips over.
    pub fn render(
        &self,
        field: &str,
        template: &str,
        variables: &Map<String, Value>,
    ) -> crate::Result<String> {
        check_syntax(field, template)?;

        let missing: Vec<String> = extract_placeholder_names(template)
            .into_iter()
            .filter(|name| !variables.contains_key(name))
            .collect();
        if !missing.is_empty() {
            return Err(MailbatchError::UndefinedPlaceholder {
                field: field.to_string(),
                names: missing,
            });
        }

        self.hbs
            .render_template(template, variables)
            .map_err(|e| MailbatchError::Template {
                field: field.to_string(),
                reason: e.to_string(),
            })
    }
}

/// Parse a template without rendering it.
pub fn check_syntax(field: &str, template: &str) -> crate::Result<()> {
    handlebars::Template::compile(template)
        .map(|_| ())
        .map_err(|e| MailbatchError::Template {
            field: field.to_string(),
            reason: e.to_string(),
        })
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn vars(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap_or_default()
    }

    #[test]
    fn test_render_substitutes_placeholders() {
        let r = TemplateRenderer::new();
        let out = r
            .render("subject", "Hi {{name}}", &vars(json!({"name": "Ann"})))
            .unwrap();
        assert_eq!(out, "Hi Ann");
    }

    #[test]
    fn test_render_literal_template() {
        let r = TemplateRenderer::new();
        let out = r.render("subject", "Monthly report", &Map::new()).unwrap();
        assert_eq!(out, "Monthly report");
    }

    #[test]
    fn test_render_does_not_escape_html() {
        let r = TemplateRenderer::new();
        let out = r
            .render("html_body", "<p>{{msg}}</p>", &vars(json!({"msg": "a & <b>"})))
            .unwrap();
        assert_eq!(out, "<p>a & <b></p>");
    }

    #[test]
    fn test_render_missing_placeholder_names_it() {
        let r = TemplateRenderer::new();
        let err = r
            .render(
                "plaintext_body",
                "Dear {{name}}, your code is {{code}}",
                &vars(json!({"name": "Ann"})),
            )
            .unwrap_err();
        assert!(
            matches!(&err, MailbatchError::UndefinedPlaceholder { field, names }
                if field == "plaintext_body" && names == &vec!["code".to_string()]),
            "unexpected error: {err}"
        );
        assert!(err.to_string().contains("code"));
    }

    #[test]
    fn test_render_malformed_template() {
        let r = TemplateRenderer::new();
        let err = r
            .render("subject", "Hi {{#if name}}", &vars(json!({"name": "x"})))
            .unwrap_err();
        assert!(
            matches!(err, MailbatchError::Template { ref field, .. } if field == "subject"),
            "unexpected error: {err}"
        );
    }

    #[test]
    fn test_render_numeric_cells() {
        let r = TemplateRenderer::new();
        let out = r
            .render("subject", "{{n}} items", &vars(json!({"n": 3})))
            .unwrap();
        assert_eq!(out, "3 items");
    }

    #[test]
    fn test_check_syntax_ok() {
        assert!(check_syntax("subject", "{{#each xs}}{{this}}{{/each}}").is_ok());
    }
}
