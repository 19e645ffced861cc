//! Minimal HTML pages for the browser-facing routes.
//!
//! The pages are deliberately plain: a layout shell, the code-entry form,
//! a success page, and an error page. Deployments that want branded pages
//! front the proxy with their own templates; the state machine only needs
//! these to close the loop with the human.

/// Escape text for interpolation into HTML.
fn escape(input: &str) -> String {
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
        "<!doctype html>\n<html lang=\"en\">\n<head>\n<meta charset=\"utf-8\">\n\
         <meta name=\"viewport\" content=\"width=device-width, initial-scale=1\">\n\
         <title>{}</title>\n</head>\n<body>\n{}\n</body>\n</html>\n",
        escape(title),
        body
    )
}

/// Landing page.
pub fn index_page() -> String {
    layout(
        "Device authorization",
        "<h1>Device authorization proxy</h1>\n\
         <p>This service links a device without a browser to your account. \
         If a device showed you a code, continue to <a href=\"device\">enter it</a>.</p>",
    )
}

/// Code-entry form, optionally pre-filled from the query string.
pub fn device_page(base_url: &str, code: Option<&str>, state: Option<&str>) -> String {
    let code = code.map(escape).unwrap_or_default();
    let state = state.map(escape).unwrap_or_default();

    let prompt = if code.is_empty() {
        "<p>Enter the code your device displayed to continue.</p>"
    } else {
        "<p>Confirm that the code below matches the one your device displayed.</p>"
    };

    let body = format!(
        "<h1>Connect your device</h1>\n{prompt}\n\
         <form action=\"{}/auth/verify_code\" method=\"get\">\n\
         <input type=\"text\" name=\"code\" placeholder=\"XXXX-XXXX\" id=\"user_code\" \
         value=\"{code}\" autocomplete=\"off\" autofocus>\n\
         <input type=\"hidden\" name=\"state\" value=\"{state}\">\n\
         <input type=\"submit\" value=\"Continue\">\n\
         </form>",
        escape(base_url)
    );

    layout("Enter your code", &body)
}

/// Shown after the redirect completes: the device will pick the token up
/// on its next poll.
pub fn signed_in_page() -> String {
    layout(
        "Signed in",
        "<h1>All set</h1>\n\
         <p>You are signed in. You can close this window and return to your device; \
         it will finish connecting on its own within a few seconds.</p>",
    )
}

/// Error page for the browser-facing routes.
pub fn error_page(error: &str, description: &str) -> String {
    let body = format!(
        "<h1>{}</h1>\n<p>{}</p>\n<p>Restart the process on your device to get a new code.</p>",
        escape(error),
        escape(description)
    );
    layout("Something went wrong", &body)
}
