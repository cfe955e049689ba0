//! Server-rendered HTML for browser clients.

use axum::response::Html;

use crate::{
    db::{iso_date, Activity, User},
    web::Flash,
};

fn escape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
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

fn layout(title: &str, flash: Option<Flash>, body: &str) -> Html<String> {
    let notice = flash
        .map(|f| {
            let class = if f.is_error() { "error" } else { "success" };
            format!(r#"<p class="{class}">{}</p>"#, escape(f.message()))
        })
        .unwrap_or_default();
    Html(format!(
        "<!doctype html>\n<html>\n<head><meta charset=\"utf-8\"><title>{title}</title></head>\n\
         <body>\n{notice}\n{body}\n</body>\n</html>\n",
        title = escape(title),
    ))
}

pub fn signup(flash: Option<Flash>) -> Html<String> {
    layout(
        "Sign up",
        flash,
        r#"<h1>Sign up</h1>
<form method="post" action="/signup">
  <label>Username <input name="username" required></label>
  <label>Password <input name="password" type="password" required></label>
  <button type="submit">Create account</button>
</form>
<p><a href="/login">Already registered? Log in</a></p>"#,
    )
}

pub fn login(flash: Option<Flash>) -> Html<String> {
    layout(
        "Log in",
        flash,
        r#"<h1>Log in</h1>
<form method="post" action="/login">
  <label>Username <input name="username" required></label>
  <label>Password <input name="password" type="password" required></label>
  <button type="submit">Log in</button>
</form>
<p><a href="/signup">Create an account</a></p>"#,
    )
}

pub fn profile(user: &User, flash: Option<Flash>) -> Html<String> {
    let items: String = if user.activities.is_empty() {
        "<p>No activities yet.</p>".to_string()
    } else {
        let rows: Vec<String> = user
            .activities
            .iter()
            .map(|a| {
                format!(
                    r#"<li><a href="/profile/{id}">{name}</a> {date}</li>"#,
                    id = a.id,
                    name = escape(&a.name),
                    date = iso_date::format(&a.date),
                )
            })
            .collect();
        format!("<ul>\n{}\n</ul>", rows.join("\n"))
    };
    let body = format!(
        r#"<h1>{username}'s activities</h1>
{items}
<h2>Add activity</h2>
<form method="post" action="/profile">
  <label>Name <input name="name" required></label>
  <label>Date <input name="date" type="date" required></label>
  <button type="submit">Add</button>
</form>
<form method="post" action="/logout"><button type="submit">Log out</button></form>"#,
        username = escape(&user.username),
    );
    layout("Profile", flash, &body)
}

pub fn activity(activity: &Activity) -> Html<String> {
    let body = format!(
        r#"<h1>{name}</h1>
<p>Date: {date}</p>
<p><a href="/profile">Back to profile</a></p>"#,
        name = escape(&activity.name),
        date = iso_date::format(&activity.date),
    );
    layout(&activity.name, None, &body)
}
