use anyhow::Result;
use axum::response::Html;
use std::sync::Arc;
use tera::{Context, Tera};

use crate::http::AppError;

const TEMPLATES: [(&str, &str); 16] = [
    ("base.html", include_str!("../../templates/base.html")),
    ("index.html", include_str!("../../templates/index.html")),
    ("group.html", include_str!("../../templates/group.html")),
    ("follow.html", include_str!("../../templates/follow.html")),
    ("posts/new.html", include_str!("../../templates/posts/new.html")),
    ("posts/post.html", include_str!("../../templates/posts/post.html")),
    ("posts/profile.html", include_str!("../../templates/posts/profile.html")),
    ("includes/post_item.html", include_str!("../../templates/includes/post_item.html")),
    ("includes/paginator.html", include_str!("../../templates/includes/paginator.html")),
    ("about/author.html", include_str!("../../templates/about/author.html")),
    ("about/tech.html", include_str!("../../templates/about/tech.html")),
    ("auth/login.html", include_str!("../../templates/auth/login.html")),
    ("auth/signup.html", include_str!("../../templates/auth/signup.html")),
    ("auth/logged_out.html", include_str!("../../templates/auth/logged_out.html")),
    ("misc/404.html", include_str!("../../templates/misc/404.html")),
    ("misc/500.html", include_str!("../../templates/misc/500.html")),
];

/// Compiled page templates, embedded in the binary.
#[derive(Clone)]
pub struct Templates {
    tera: Arc<Tera>,
}

impl Templates {
    pub fn load() -> Result<Self> {
        let mut tera = Tera::default();
        tera.add_raw_templates(TEMPLATES)?;
        Ok(Self {
            tera: Arc::new(tera),
        })
    }

    pub fn render(&self, name: &str, context: &Context) -> Result<Html<String>, AppError> {
        self.tera.render(name, context).map(Html).map_err(|err| {
            tracing::error!(error = ?err, template = name, "failed to render template");
            AppError::internal("failed to render page")
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_template_compiles_and_error_pages_render() {
        let templates = Templates::load().unwrap();
        let mut context = Context::new();
        context.insert("user", &None::<()>);
        context.insert("path", "/missing-page/");

        let Html(body) = templates.render("misc/404.html", &context).unwrap();
        assert!(body.contains("missing-page"));
        let Html(body) = templates.render("misc/500.html", &context).unwrap();
        assert!(body.contains("<html"));
    }
}
