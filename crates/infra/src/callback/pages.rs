//! HTML rendered to the browser tab after the redirect

/// Escape text for inclusion in HTML element content.
pub(crate) fn escape_html(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            _ => escaped.push(c),
        }
    }
    escaped
}

pub(crate) fn success_page() -> String {
    r#"<!DOCTYPE html>
<html>
<head><meta charset="utf-8"><title>Authorization Successful</title></head>
<body style="font-family:sans-serif;text-align:center;padding-top:60px">
  <h1 style="color:#2ea44f">&#10003; Authorization Successful</h1>
  <p>You have been successfully authorized.</p>
  <p>You can close this tab and return to your terminal.</p>
</body>
</html>"#
        .to_string()
}

pub(crate) fn failure_page(message: &str) -> String {
    format!(
        r#"<!DOCTYPE html>
<html>
<head><meta charset="utf-8"><title>Authorization Failed</title></head>
<body style="font-family:sans-serif;text-align:center;padding-top:60px">
  <h1 style="color:#cb2431">&#10007; Authorization Failed</h1>
  <p>{}</p>
  <p>You can close this tab and check your terminal for details.</p>
</body>
</html>"#,
        escape_html(message)
    )
}

pub(crate) fn already_handled_page() -> String {
    failure_page("This authorization response was already handled. Check your terminal.")
}
