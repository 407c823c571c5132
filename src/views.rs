//! Inline HTML views.
//!
//! Every user-supplied string goes through [`html_escape`] before it is
//! interpolated.

const STYLES: &str = r#"
    body {
        font-family: -apple-system, BlinkMacSystemFont, "Segoe UI", Roboto, Arial, sans-serif;
        max-width: 720px;
        margin: 40px auto;
        padding: 0 20px;
        background: #f5f5f5;
    }
    .container {
        background: white;
        padding: 30px;
        border-radius: 8px;
        box-shadow: 0 2px 4px rgba(0,0,0,0.1);
    }
    .form-group { margin: 15px 0; }
    label { display: block; font-weight: bold; margin-bottom: 5px; }
    input[type="text"], input[type="email"], input[type="password"] {
        width: 100%;
        padding: 10px;
        border: 1px solid #ddd;
        border-radius: 4px;
        box-sizing: border-box;
    }
    button, .btn {
        background: #0066cc;
        color: white;
        padding: 10px 20px;
        border: none;
        border-radius: 4px;
        text-decoration: none;
        cursor: pointer;
    }
    .secret { padding: 12px; margin: 8px 0; background: #f9f9f9; border-radius: 4px; }
    .error { color: #d9534f; background: #f2dede; padding: 10px; border-radius: 4px; }
"#;

fn layout(title: &str, body: &str) -> String {
    format!(
        r#"<!DOCTYPE html>
<html>
<head>
    <meta charset="utf-8">
    <title>Secrets - {title}</title>
    <style>{STYLES}</style>
</head>
<body>
    <div class="container">
{body}
    </div>
</body>
</html>"#
    )
}

fn error_banner(error: Option<&str>) -> String {
    error.map_or(String::new(), |e| {
        format!(r#"<div class="error">{}</div>"#, html_escape(e))
    })
}

pub fn home_page() -> String {
    layout(
        "Home",
        r#"        <h1>Secrets</h1>
        <p>Don't keep your secrets, share them anonymously!</p>
        <a class="btn" href="/register">Register</a>
        <a class="btn" href="/login">Login</a>"#,
    )
}

pub fn login_page(error: Option<&str>) -> String {
    let error_html = error_banner(error);
    layout(
        "Login",
        &format!(
            r#"        <h1>Login</h1>
        {error_html}
        <form method="POST" action="/login">
            <div class="form-group">
                <label for="username">Email</label>
                <input type="email" id="username" name="username" required autofocus>
            </div>
            <div class="form-group">
                <label for="password">Password</label>
                <input type="password" id="password" name="password" required>
            </div>
            <button type="submit">Login</button>
        </form>
        <p><a href="/auth/provider">Sign in with your provider account</a></p>"#
        ),
    )
}

pub fn register_page(error: Option<&str>) -> String {
    let error_html = error_banner(error);
    layout(
        "Register",
        &format!(
            r#"        <h1>Register</h1>
        {error_html}
        <form method="POST" action="/register">
            <div class="form-group">
                <label for="username">Email</label>
                <input type="email" id="username" name="username" required autofocus>
            </div>
            <div class="form-group">
                <label for="password">Password</label>
                <input type="password" id="password" name="password" required>
            </div>
            <button type="submit">Register</button>
        </form>
        <p><a href="/auth/provider">Sign up with your provider account</a></p>"#
        ),
    )
}

pub fn secrets_page(secrets: &[String]) -> String {
    let items: String = secrets
        .iter()
        .map(|s| format!(r#"        <p class="secret">{}</p>"#, html_escape(s)))
        .collect::<Vec<_>>()
        .join("\n");
    layout(
        "Secrets",
        &format!(
            r#"        <h1>You've Discovered My Secret!</h1>
{items}
        <a class="btn" href="/logout">Log Out</a>
        <a class="btn" href="/submit">Submit a Secret</a>"#
        ),
    )
}

pub fn submit_page() -> String {
    layout(
        "Submit",
        r#"        <h1>Secrets</h1>
        <p>Don't keep your secrets, share them anonymously!</p>
        <form method="POST" action="/submit">
            <div class="form-group">
                <input type="text" name="secret" placeholder="What's your secret?" required>
            </div>
            <button type="submit">Submit</button>
        </form>"#,
    )
}

pub fn failure_page(message: &str) -> String {
    layout(
        "Error",
        &format!(
            r#"        <h1>Error</h1>
        <div class="error">{}</div>
        <a class="btn" href="/">Home</a>"#,
            html_escape(message)
        ),
    )
}

/// Escape HTML special characters
pub fn html_escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#x27;")
}
