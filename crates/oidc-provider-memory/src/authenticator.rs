//! A minimal form-based end-user authenticator for development and tests.
//!
//! Control parameters are prefixed with `_` so they never collide with
//! protocol parameters:
//!
//! | Parameter   | Effect                                        |
//! |-------------|-----------------------------------------------|
//! | `_abort`    | the end-user cancelled                        |
//! | `_fail`     | authentication failed                         |
//! | `_login`    | log in as `_username` (`subject.issuer`)      |
//!
//! Anything else renders the login form, which re-posts every protocol
//! parameter back to the authorization endpoint.

use async_trait::async_trait;
use oidc_provider::{AuthRequest, AuthState, Authenticated, Authenticator, Prompt};
use time::OffsetDateTime;

/// Username/password form. Any non-empty password is accepted.
#[derive(Debug, Clone, Default)]
pub struct FormAuthenticator {
    title: Option<String>,
}

impl FormAuthenticator {
    /// Creates an authenticator with the default page title.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the page title.
    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    fn render(&self, request: &AuthRequest, error: Option<&str>) -> String {
        let title = self.title.as_deref().unwrap_or("Sign in");
        let mut html = String::with_capacity(2048);

        html.push_str("<!DOCTYPE html>\n<html lang=\"en\">\n<head>\n");
        html.push_str("<meta charset=\"UTF-8\">\n<title>");
        html.push_str(&html_escape(title));
        html.push_str("</title>\n</head>\n<body>\n<h1>");
        html.push_str(&html_escape(title));
        html.push_str("</h1>\n");

        if let Some(e) = error {
            html.push_str("<p class=\"error\">");
            html.push_str(&html_escape(e));
            html.push_str("</p>\n");
        }

        html.push_str("<form method=\"POST\" action=\"");
        html.push_str(&html_escape(request.uri.path()));
        html.push_str("\">\n");

        let mut params: Vec<_> = request
            .params()
            .iter()
            .filter(|(name, _)| !name.starts_with('_'))
            .collect();
        params.sort_unstable();
        for (name, value) in params {
            html.push_str("<input type=\"hidden\" name=\"");
            html.push_str(&html_escape(name));
            html.push_str("\" value=\"");
            html.push_str(&html_escape(value));
            html.push_str("\">\n");
        }

        html.push_str(
            "<label>Username <input type=\"text\" name=\"_username\" \
             placeholder=\"subject.issuer\" required></label>\n",
        );
        html.push_str(
            "<label>Password <input type=\"password\" name=\"_password\" required></label>\n",
        );
        html.push_str("<button type=\"submit\" name=\"_login\" value=\"1\">Sign in</button>\n");
        html.push_str("<button type=\"submit\" name=\"_abort\" value=\"1\" formnovalidate>Cancel</button>\n");
        html.push_str("</form>\n</body>\n</html>");
        html
    }
}

#[async_trait]
impl Authenticator for FormAuthenticator {
    async fn auth_page(&self, request: &AuthRequest) -> AuthState {
        if request.params().has("_abort") {
            return AuthState::Aborted;
        }
        if request.params().has("_fail") {
            return AuthState::Failed;
        }
        if !request.params().has("_login") {
            return AuthState::Prompting(Prompt::html(self.render(request, None)));
        }

        let username = request.param("_username");
        let Some((subject, issuer)) = username
            .split_once('.')
            .filter(|(subject, issuer)| !subject.is_empty() && !issuer.is_empty())
        else {
            return AuthState::Prompting(Prompt::html(
                self.render(request, Some("Username must look like subject.issuer")),
            ));
        };

        if request.param("_password").is_empty() {
            return AuthState::Prompting(Prompt::html(
                self.render(request, Some("Password is required")),
            ));
        }

        tracing::debug!(subject, issuer, "Form login");
        AuthState::Ok(Authenticated {
            issuer: issuer.to_string(),
            subject: subject.to_string(),
            auth_time: OffsetDateTime::now_utc(),
            acr: Some("0".to_string()),
            amr: vec!["pwd".to_string()],
        })
    }
}

/// Simple HTML escaping to prevent XSS.
fn html_escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#39;")
}
