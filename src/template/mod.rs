//! Message templating for subjects and bodies.
//!
//! Templates use Jinja syntax powered by minijinja and are rendered against
//! the event's template context (`Entity.Name`, `Check.Output`, ...).
//! Two renderers share the same helpers:
//!
//! - [`PlainRenderer`] interpolates values verbatim (subjects, plain bodies).
//! - [`HtmlRenderer`] HTML-escapes every interpolated value (HTML bodies).
//!
//! Field references may also be written with a leading dot
//! (`{{.Check.Name}}`); they are rewritten to plain lookups before parsing.
//!
//! # Example
//!
//! ```ignore
//! let engine = TemplateEngine::new();
//! let msg = engine.render_message("Alert: {{.Check.Name}}", "{{ Check.Output }}", &event)?;
//! assert_eq!(msg.content_type, ContentType::Plain);
//! ```

mod helpers;

pub use helpers::Timestamp;

use crate::error::TemplateError;
use crate::event::Event;
use crate::message::ContentType;
use minijinja::{AutoEscape, Environment, UndefinedBehavior};
use regex::{Captures, Regex};
use serde_json::Value;
use std::borrow::Cow;
use std::sync::LazyLock;

/// Expression and statement tags.
static TAG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)\{\{.*?\}\}|\{%.*?%\}").expect("valid regex"));

/// String literals (kept as-is) or a leading-dot reference after a delimiter.
static DOT_REF: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r#""(?:[^"\\]|\\.)*"|'(?:[^'\\]|\\.)*'|(?P<lead>[\s{(\[,|=!<>+*/~%-])\.(?P<ident>[A-Za-z_])"#,
    )
    .expect("valid regex")
});

/// Rewrite `.Field` references inside tags into `Field`.
///
/// Text outside `{{ }}` / `{% %}` and string literals inside them are left
/// untouched, so `split(.Check.Name, ".")` becomes `split(Check.Name, ".")`.
pub fn normalize_field_refs(source: &str) -> Cow<'_, str> {
    TAG.replace_all(source, |tag: &Captures| {
        DOT_REF
            .replace_all(&tag[0], |caps: &Captures| match (caps.name("lead"), caps.name("ident")) {
                (Some(lead), Some(ident)) => format!("{}{}", lead.as_str(), ident.as_str()),
                _ => caps[0].to_string(),
            })
            .into_owned()
    })
}

/// Renders one template source against a data context.
pub trait Renderer {
    /// Render `source`; `name` identifies the template in error messages.
    fn render(&self, name: &str, source: &str, context: &Value) -> Result<String, TemplateError>;
}

fn base_environment() -> Environment<'static> {
    let mut env = Environment::new();
    env.set_undefined_behavior(UndefinedBehavior::Strict);
    env.set_keep_trailing_newline(true);
    helpers::register(&mut env);
    env
}

fn render_with(
    env: &Environment<'static>,
    name: &str,
    source: &str,
    context: &Value,
) -> Result<String, TemplateError> {
    let source = normalize_field_refs(source);
    env.render_str(&source, context)
        .map_err(|e| TemplateError::RenderFailed {
            name: name.to_string(),
            message: e.to_string(),
        })
}

/// Renderer without escaping.
pub struct PlainRenderer {
    env: Environment<'static>,
}

impl PlainRenderer {
    pub fn new() -> Self {
        Self {
            env: base_environment(),
        }
    }
}

impl Default for PlainRenderer {
    fn default() -> Self {
        Self::new()
    }
}

impl Renderer for PlainRenderer {
    fn render(&self, name: &str, source: &str, context: &Value) -> Result<String, TemplateError> {
        render_with(&self.env, name, source, context)
    }
}

/// Renderer that HTML-escapes every interpolated value.
pub struct HtmlRenderer {
    env: Environment<'static>,
}

impl HtmlRenderer {
    pub fn new() -> Self {
        let mut env = base_environment();
        env.set_auto_escape_callback(|_| AutoEscape::Html);
        Self { env }
    }
}

impl Default for HtmlRenderer {
    fn default() -> Self {
        Self::new()
    }
}

impl Renderer for HtmlRenderer {
    fn render(&self, name: &str, source: &str, context: &Value) -> Result<String, TemplateError> {
        render_with(&self.env, name, source, context)
    }
}

/// Subject and body of one notification, ready for composition.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderedMessage {
    pub subject: String,
    pub body: String,
    pub content_type: ContentType,
}

/// Holds both renderers and picks one per content type.
#[derive(Default)]
pub struct TemplateEngine {
    plain: PlainRenderer,
    html: HtmlRenderer,
}

impl TemplateEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn renderer(&self, content_type: ContentType) -> &dyn Renderer {
        match content_type {
            ContentType::Plain => &self.plain,
            ContentType::Html => &self.html,
        }
    }

    /// Render the subject (always plain) and the body (mode chosen from the
    /// body template source).
    pub fn render_message(
        &self,
        subject_template: &str,
        body_template: &str,
        event: &Event,
    ) -> Result<RenderedMessage, TemplateError> {
        let context = event.template_context();
        let content_type = ContentType::detect(body_template);

        let subject = self.plain.render("subject", subject_template, &context)?;
        let body = self
            .renderer(content_type)
            .render("body", body_template, &context)?;

        tracing::debug!(
            content_type = content_type.as_str(),
            subject_len = subject.len(),
            body_len = body.len(),
            "Templates rendered"
        );

        Ok(RenderedMessage {
            subject,
            body,
            content_type,
        })
    }
}

impl std::fmt::Debug for TemplateEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TemplateEngine").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::fixtures;
    use serde_json::json;

    fn ctx() -> Value {
        fixtures::event("foo", "bar").template_context()
    }

    // ===================================================================
    // Field reference normalization
    // ===================================================================

    #[test]
    fn normalize_rewrites_leading_dot_refs() {
        assert_eq!(normalize_field_refs("{{.Check.Name}}"), "{{Check.Name}}");
        assert_eq!(
            normalize_field_refs("{{ unix_time(.Check.Executed) }}"),
            "{{ unix_time(Check.Executed) }}"
        );
        assert_eq!(
            normalize_field_refs("{% for h in .Check.Hooks %}{{ .Name }}{% endfor %}"),
            "{% for h in Check.Hooks %}{{ Name }}{% endfor %}"
        );
    }

    #[test]
    fn normalize_keeps_string_literals_and_plain_text() {
        assert_eq!(
            normalize_field_refs(r#"v1.2 {{ split(.Entity.Name, ".")._0 }} .x"#),
            r#"v1.2 {{ split(Entity.Name, ".")._0 }} .x"#
        );
        assert_eq!(
            normalize_field_refs("{{ '.a' ~ .Check.Name }}"),
            "{{ '.a' ~ Check.Name }}"
        );
    }

    #[test]
    fn normalize_leaves_attribute_access_and_numbers_alone() {
        assert_eq!(
            normalize_field_refs("{{ Check.Name }} {{ 1.5 }}"),
            "{{ Check.Name }} {{ 1.5 }}"
        );
    }

    // ===================================================================
    // Plain rendering
    // ===================================================================

    #[test]
    fn plain_renders_event_fields() {
        let out = PlainRenderer::new()
            .render(
                "body",
                "Entity: {{.Entity.Name}} Check: {{.Check.Name}} State: {{ Check.State }}",
                &ctx(),
            )
            .unwrap();
        assert_eq!(out, "Entity: foo Check: bar State: passing");
    }

    #[test]
    fn plain_renders_executed_time() {
        let out = PlainRenderer::new()
            .render(
                "body",
                r#"Executed: {{ unix_time(.Check.Executed).format("%d %b %Y %H:%M:%S") }}"#,
                &ctx(),
            )
            .unwrap();
        assert_eq!(out, "Executed: 14 Nov 2023 22:13:20");
    }

    #[test]
    fn plain_does_not_escape_markup() {
        let context = json!({"Check": {"Output": "<b>x</b> & y"}});
        let out = PlainRenderer::new()
            .render("body", "{{ Check.Output }}", &context)
            .unwrap();
        assert_eq!(out, "<b>x</b> & y");
    }

    #[test]
    fn trailing_newline_is_preserved() {
        let out = PlainRenderer::new()
            .render("body", "{{ Check.Output }}\n", &ctx())
            .unwrap();
        assert_eq!(out, "OK\n");
    }

    #[test]
    fn rendering_is_idempotent() {
        let renderer = PlainRenderer::new();
        let source = "{{ Entity.Name }}/{{ Check.Name }} {{ unix_time(Check.Executed) }}";
        let first = renderer.render("subject", source, &ctx()).unwrap();
        let second = renderer.render("subject", source, &ctx()).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn hook_loop_renders_each_hook() {
        let context = json!({"Check": {"Output": "down", "Hooks": [
            {"Name": "ps", "Command": "ps aux", "Output": "nothing"},
            {"Name": "df", "Command": "df -h", "Output": "full"}
        ]}});
        let out = PlainRenderer::new()
            .render(
                "body",
                "{{ Check.Output }}|{% for h in Check.Hooks %}{{ h.Name }}={{ h.Command }};{% endfor %}",
                &context,
            )
            .unwrap();
        assert_eq!(out, "down|ps=ps aux;df=df -h;");
    }

    // ===================================================================
    // Failures are errors, never partial output
    // ===================================================================

    #[test]
    fn undefined_reference_is_an_error() {
        let err = PlainRenderer::new()
            .render("subject", "{{ Check.Nope }}", &ctx())
            .unwrap_err();
        let TemplateError::RenderFailed { name, .. } = err;
        assert_eq!(name, "subject");
    }

    #[test]
    fn syntax_error_is_an_error() {
        let err = PlainRenderer::new()
            .render("body", "{{ Check.Name ", &ctx())
            .unwrap_err();
        assert!(err.to_string().starts_with("body template render failed"));
    }

    #[test]
    fn helper_failure_is_an_error() {
        let result = PlainRenderer::new().render("body", "{{ div(Check.Status, 0) }}", &ctx());
        assert!(result.is_err());
    }

    // ===================================================================
    // HTML rendering
    // ===================================================================

    #[test]
    fn html_escapes_interpolated_values() {
        let context = json!({"Check": {"Output": "<script>alert(1)</script> & more"}});
        let out = HtmlRenderer::new()
            .render("body", "<html><p>{{ Check.Output }}</p></html>", &context)
            .unwrap();
        assert!(out.starts_with("<html><p>&lt;script&gt;"));
        assert!(out.contains("&amp; more"));
        assert!(!out.contains("<script>"));
    }

    #[test]
    fn html_keeps_template_markup() {
        let out = HtmlRenderer::new()
            .render("body", "<html><b>{{ Entity.Name }}</b></html>", &ctx())
            .unwrap();
        assert_eq!(out, "<html><b>foo</b></html>");
    }

    // ===================================================================
    // Engine
    // ===================================================================

    #[test]
    fn engine_renders_subject_plain_and_detects_html_body() {
        let event = fixtures::event("web<1>", "disk");
        let engine = TemplateEngine::new();

        let msg = engine
            .render_message("Alert: {{ Entity.Name }}", "<html>{{ Entity.Name }}</html>", &event)
            .unwrap();

        assert_eq!(msg.subject, "Alert: web<1>");
        assert_eq!(msg.body, "<html>web&lt;1&gt;</html>");
        assert_eq!(msg.content_type, ContentType::Html);
    }

    #[test]
    fn engine_detects_plain_body() {
        let event = fixtures::event("foo", "bar");
        let msg = TemplateEngine::new()
            .render_message("s", "{{ Check.Output }}", &event)
            .unwrap();
        assert_eq!(msg.body, "OK");
        assert_eq!(msg.content_type, ContentType::Plain);
    }

    #[test]
    fn engine_content_type_ignores_rendered_output() {
        let mut event = fixtures::event("foo", "bar");
        if let Some(check) = event.check.as_mut() {
            check.output = "<html>injected</html>".to_string();
        }
        let msg = TemplateEngine::new()
            .render_message("s", "{{ Check.Output }}", &event)
            .unwrap();
        assert_eq!(msg.content_type, ContentType::Plain);
    }

    #[test]
    fn engine_reports_which_template_failed() {
        let event = fixtures::event("foo", "bar");
        let err = TemplateEngine::new()
            .render_message("{{ Missing }}", "{{ Check.Output }}", &event)
            .unwrap_err();
        assert!(err.to_string().starts_with("subject template"));
    }
}
