//! Minimal server-rendered pages.
//!
//! Just enough HTML to carry the auth forms, banners, and redirects. Every
//! user-supplied value is escaped before it lands in markup.

use super::auth::guard::Identity;
use super::auth::types::SignupForm;

/// Escape user input for interpolation into HTML.
#[must_use]
pub fn escape(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for c in input.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

fn layout(title: &str, body: &str) -> String {
    format!(
        "<!DOCTYPE html>\n\
         <html lang=\"en\">\n\
         <head><meta charset=\"utf-8\"><title>{title} · Autogate</title></head>\n\
         <body>\n<h1>{title}</h1>\n{body}\n</body>\n</html>\n"
    )
}

fn error_banner(message: Option<&str>) -> String {
    message.map_or_else(String::new, |message| {
        format!("<p class=\"error\">{}</p>\n", escape(message))
    })
}

#[must_use]
pub fn landing() -> String {
    layout(
        "Autogate",
        "<p>Buy and sell cars.</p>\n\
         <p><a href=\"/login\">Log in</a> or <a href=\"/signup\">sign up</a>.</p>",
    )
}

/// Signup form; on validation failure the submitted name, email, and role
/// are preserved so the user only fixes what was wrong.
#[must_use]
pub fn signup(message: Option<&str>, old: &SignupForm) -> String {
    let user_selected = if old.role == "admin" { "" } else { " selected" };
    let admin_selected = if old.role == "admin" { " selected" } else { "" };
    let body = format!(
        "{banner}\
         <form method=\"post\" action=\"/signup\">\n\
         <label>Name <input name=\"name\" value=\"{name}\"></label>\n\
         <label>Email <input name=\"email\" type=\"email\" value=\"{email}\"></label>\n\
         <label>Password <input name=\"password\" type=\"password\"></label>\n\
         <label>Confirm password <input name=\"confirm_password\" type=\"password\"></label>\n\
         <label>Role <select name=\"role\">\n\
         <option value=\"user\"{user_selected}>User</option>\n\
         <option value=\"admin\"{admin_selected}>Admin</option>\n\
         </select></label>\n\
         <button type=\"submit\">Sign up</button>\n\
         </form>\n\
         <p>Already registered? <a href=\"/login\">Log in</a>.</p>",
        banner = error_banner(message),
        name = escape(&old.name),
        email = escape(&old.email),
    );
    layout("Sign up", &body)
}

/// Login form; `notice` carries the post-signup / post-reset banners.
#[must_use]
pub fn login(message: Option<&str>, notice: Option<&str>, old_email: &str) -> String {
    let notice = notice.map_or_else(String::new, |notice| {
        format!("<p class=\"notice\">{}</p>\n", escape(notice))
    });
    let body = format!(
        "{notice}{banner}\
         <form method=\"post\" action=\"/login\">\n\
         <label>Email <input name=\"email\" type=\"email\" value=\"{email}\"></label>\n\
         <label>Password <input name=\"password\" type=\"password\"></label>\n\
         <button type=\"submit\">Log in</button>\n\
         </form>\n\
         <p><a href=\"/forgot-password\">Forgot your password?</a></p>\n\
         <p>New here? <a href=\"/signup\">Sign up</a>.</p>",
        banner = error_banner(message),
        email = escape(old_email),
    );
    layout("Log in", &body)
}

#[must_use]
pub fn forgot_password(message: Option<&str>, old_email: &str) -> String {
    let body = format!(
        "{banner}\
         <form method=\"post\" action=\"/forgot-password\">\n\
         <label>Email <input name=\"email\" type=\"email\" value=\"{email}\"></label>\n\
         <button type=\"submit\">Send reset link</button>\n\
         </form>",
        banner = error_banner(message),
        email = escape(old_email),
    );
    layout("Forgot password", &body)
}

/// Acknowledgement shown after a forgot-password submission, identical
/// whether or not the email matched an account.
#[must_use]
pub fn forgot_password_sent() -> String {
    layout(
        "Check your inbox",
        "<p>If an account exists for that address, a reset link is on its way.</p>\n\
         <p><a href=\"/login\">Back to login</a></p>",
    )
}

#[must_use]
pub fn reset_password(token: &str, message: Option<&str>) -> String {
    let body = format!(
        "{banner}\
         <form method=\"post\" action=\"/reset-password\">\n\
         <input type=\"hidden\" name=\"token\" value=\"{token}\">\n\
         <label>New password <input name=\"new_password\" type=\"password\"></label>\n\
         <label>Confirm password <input name=\"confirm_password\" type=\"password\"></label>\n\
         <button type=\"submit\">Reset password</button>\n\
         </form>",
        banner = error_banner(message),
        token = escape(token),
    );
    layout("Reset password", &body)
}

/// Shared page for unknown, consumed, or expired action tokens. One wording
/// for every failure so nothing is revealed about which case applied.
#[must_use]
pub fn invalid_token() -> String {
    layout(
        "Link not valid",
        "<p>This link is invalid or has expired.</p>\n\
         <p><a href=\"/login\">Back to login</a></p>",
    )
}

#[must_use]
pub fn email_verified() -> String {
    layout(
        "Email verified",
        "<p>Your email address is confirmed. You can log in now.</p>\n\
         <p><a href=\"/login\">Log in</a></p>",
    )
}

#[must_use]
pub fn user_dashboard(identity: &Identity) -> String {
    let body = format!(
        "<p>Signed in as {}.</p>\n\
         <p><a href=\"/logout\">Log out</a></p>",
        escape(&identity.email)
    );
    layout("Your dashboard", &body)
}

#[must_use]
pub fn admin_dashboard(identity: &Identity) -> String {
    let body = format!(
        "<p>Signed in as {} (admin).</p>\n\
         <p><a href=\"/logout\">Log out</a></p>",
        escape(&identity.email)
    );
    layout("Admin dashboard", &body)
}

/// Generic failure page for infrastructure errors. Details stay in the logs.
#[must_use]
pub fn internal_error() -> String {
    layout(
        "Something went wrong",
        "<p>Please try again in a moment.</p>",
    )
}
