//! Minimal server-rendered markup.

use std::fmt::Write;

use axum::http::StatusCode;
use axum::response::{Html, IntoResponse, Response};
use echo_core::{EchoError, Post, Principal, TenantContext};

use super::flash::Flash;

pub fn escape(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#x27;"),
            _ => out.push(c),
        }
    }
    out
}

/// What every page needs besides its body.
pub struct Chrome<'a> {
    pub tenant: &'a TenantContext,
    pub user: Option<&'a Principal>,
    pub flashes: Vec<Flash>,
}

fn nav(chrome: &Chrome<'_>) -> String {
    let mut links = String::from(r#"<a href="/">Home</a>"#);
    if !chrome.tenant.is_public() {
        links.push_str(r#" | <a href="/blog/">Blog</a>"#);
    }
    match chrome.user {
        Some(user) => {
            let _ = write!(
                links,
                r#" | <span>Signed in as {}</span> | <a href="/logout">Log out</a>"#,
                escape(&user.username)
            );
        }
        None => {
            links.push_str(r#" | <a href="/login">Log in</a>"#);
            if chrome.tenant.is_public() {
                links.push_str(r#" | <a href="/register">Register</a>"#);
            }
        }
    }
    format!("<nav>{links}</nav>")
}

fn flashes(items: &[Flash]) -> String {
    if items.is_empty() {
        return String::new();
    }
    let mut out = String::from(r#"<ul class="messages">"#);
    for f in items {
        let _ = write!(
            out,
            r#"<li class="{}">{}</li>"#,
            f.level.as_str(),
            escape(&f.message)
        );
    }
    out.push_str("</ul>");
    out
}

pub fn layout(title: &str, chrome: &Chrome<'_>, body: &str) -> Html<String> {
    Html(format!(
        "<!DOCTYPE html>\n<html><head><meta charset=\"utf-8\"><title>{title} | EchoBlogs</title></head>\
         <body>{nav}{flashes}<main>{body}</main></body></html>",
        title = escape(title),
        nav = nav(chrome),
        flashes = flashes(&chrome.flashes),
    ))
}

pub fn home(chrome: &Chrome<'_>) -> String {
    if chrome.tenant.is_public() {
        return String::from(
            "<h1>EchoBlogs</h1><p>Register to get your own blog on its own domain.</p>",
        );
    }
    format!(
        r#"<h1>{}</h1><p><a href="/blog/">Read the blog</a></p>"#,
        escape(&chrome.tenant.domain)
    )
}

pub fn register_form() -> String {
    String::from(
        r#"<h1>Register</h1>
<form method="post" action="/register">
<label>Username <input name="username" required></label>
<label>Email <input name="email" type="email" required></label>
<label>Password <input name="password" type="password" required></label>
<label>Confirm password <input name="confirm_password" type="password" required></label>
<button type="submit">Create account</button>
</form>"#,
    )
}

pub fn login_form() -> String {
    String::from(
        r#"<h1>Log in</h1>
<form method="post" action="/login">
<label>Username <input name="username" required></label>
<label>Password <input name="password" type="password" required></label>
<button type="submit">Log in</button>
</form>"#,
    )
}

pub fn post_list(posts: &[Post], can_write: bool) -> String {
    let mut out = String::from("<h1>Posts</h1>");
    if posts.is_empty() {
        out.push_str("<p>No posts yet.</p>");
    }
    for post in posts {
        let _ = write!(
            out,
            "<article><h2>{}</h2><p class=\"meta\">by {} on {}</p><div>{}</div></article>",
            escape(&post.title),
            escape(&post.author_username),
            post.created_at.format("%Y-%m-%d %H:%M"),
            escape(&post.content),
        );
    }
    if can_write {
        out.push_str(
            r#"<h2>New post</h2>
<form method="post" action="/blog/">
<label>Title <input name="title" maxlength="200" required></label>
<label>Content <textarea name="content" required></textarea></label>
<button type="submit">Publish</button>
</form>"#,
        );
    }
    out
}

/// An error rendered as a page.
pub struct HtmlError(pub anyhow::Error);

impl<E> From<E> for HtmlError
where
    E: Into<anyhow::Error>,
{
    fn from(err: E) -> Self {
        Self(err.into())
    }
}

impl IntoResponse for HtmlError {
    fn into_response(self) -> Response {
        let err = match EchoError::from_anyhow(&self.0) {
            Some(echo) => echo.sanitize_for_client(),
            None => EchoError::general_error("Internal server error"),
        };
        let status =
            StatusCode::from_u16(err.code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        if status.is_server_error() {
            tracing::error!(error = ?self.0, "page failed");
        }
        let body = format!(
            "<!DOCTYPE html>\n<html><head><meta charset=\"utf-8\"><title>{name} | EchoBlogs</title></head>\
             <body><nav><a href=\"/\">Home</a></nav><main><h1>{name}</h1><p>{message}</p></main></body></html>",
            name = escape(err.name()),
            message = escape(&err.message),
        );
        (status, Html(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn markup_is_escaped() {
        assert_eq!(
            escape(r#"<script>alert("x")</script> & 'y'"#),
            "&lt;script&gt;alert(&quot;x&quot;)&lt;/script&gt; &amp; &#x27;y&#x27;"
        );
    }
}
