//! Tab title templating.
//!
//! Renders the user's title template by token substitution. Supported
//! tokens: `{status}`, `{title}`, `{model}`, `{site}`. Unknown text passes
//! through untouched.

use crate::page::HostPage;

/// Values substituted into the title template for one render.
#[derive(Debug, Clone, Copy)]
pub struct TitleContext<'a> {
    pub status: &'a str,
    pub title: &'a str,
    pub model: &'a str,
    pub site: &'a str,
}

/// Substitute template tokens and tidy the edges (empty tokens at either
/// end would otherwise leave stray whitespace).
pub fn render_template(template: &str, ctx: &TitleContext<'_>) -> String {
    template
        .replace("{status}", ctx.status)
        .replace("{title}", ctx.title)
        .replace("{model}", ctx.model)
        .replace("{site}", ctx.site)
        .trim()
        .to_string()
}

/// Caching title renderer.
///
/// Unforced renders producing the same string as the previous one skip the
/// `set_title` call; a forced render always writes.
#[derive(Debug)]
pub struct TitleRenderer {
    template: String,
    last_rendered: Option<String>,
}

impl TitleRenderer {
    pub fn new(template: impl Into<String>) -> Self {
        Self {
            template: template.into(),
            last_rendered: None,
        }
    }

    /// Render the template and push it to the page title.
    pub fn render(&mut self, page: &dyn HostPage, ctx: &TitleContext<'_>, force: bool) {
        let rendered = render_template(&self.template, ctx);
        if !force && self.last_rendered.as_deref() == Some(rendered.as_str()) {
            return;
        }
        log::debug!("Title render (force={}): {}", force, rendered);
        page.set_title(&rendered);
        self.last_rendered = Some(rendered);
    }
}
