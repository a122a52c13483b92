//! Server-rendered pages
//!
//! Templates live in `templates/` and are compiled into the binary; the
//! [`pages`] module holds the handlers that fill them.

pub mod pages;

pub use pages::routes;

use crate::core::error::{AppError, AppResult};
use axum::response::{Html, IntoResponse, Response};
use tera::{Context, Tera};

const TEMPLATES: &[(&str, &str)] = &[
    ("base.html", include_str!("../../templates/base.html")),
    ("overview.html", include_str!("../../templates/overview.html")),
    ("tour.html", include_str!("../../templates/tour.html")),
    ("login.html", include_str!("../../templates/login.html")),
    ("signup.html", include_str!("../../templates/signup.html")),
    ("account.html", include_str!("../../templates/account.html")),
    ("error.html", include_str!("../../templates/error.html")),
];

/// Message shown on error pages when the real one must stay on the server
const GENERIC_ERROR: &str = "Please try again later.";

pub struct Views {
    tera: Tera,
}

impl Views {
    pub fn new() -> AppResult<Self> {
        let mut tera = Tera::default();
        tera.add_raw_templates(TEMPLATES.iter().copied())?;
        tera.autoescape_on(vec![".html"]);
        Ok(Self { tera })
    }

    pub fn render(&self, template: &str, context: &Context) -> AppResult<Html<String>> {
        Ok(Html(self.tera.render(template, context)?))
    }

    /// The error page for `err`, with the status it maps to
    pub fn error_page(&self, err: &AppError, mask_internal: bool) -> Response {
        let msg = if mask_internal && !err.is_exposable() {
            GENERIC_ERROR.to_string()
        } else {
            err.to_string()
        };

        let mut context = Context::new();
        context.insert("title", "Something went wrong!");
        context.insert("msg", &msg);

        match self.tera.render("error.html", &context) {
            Ok(html) => (err.status_code(), Html(html)).into_response(),
            Err(e) => {
                tracing::error!(error = ?e, "error page failed to render");
                (err.status_code(), msg).into_response()
            }
        }
    }
}
