//! Pages served to the browser at the end of the interactive flow

const SUCCESS_HTML: &str = r#"<!DOCTYPE html>
<html lang="en">
<head><meta charset="utf-8"><title>bnd: authentication complete</title></head>
<body style="font-family: sans-serif; margin: 4em;">
<h1>Authentication complete</h1>
<p>You can close this window and return to your terminal.</p>
</body>
</html>
"#;

const ERROR_HTML: &str = r#"<!DOCTYPE html>
<html lang="en">
<head><meta charset="utf-8"><title>bnd: authentication failed</title></head>
<body style="font-family: sans-serif; margin: 4em;">
<h1>Authentication failed</h1>
<p>{error}</p>
</body>
</html>
"#;

/// Pages shown after the OAuth callback.
pub trait HtmlTemplates: Send + Sync {
    fn success_html(&self) -> &str {
        SUCCESS_HTML
    }

    /// `error` is plain text and must be escaped before embedding.
    fn error_html(&self, error: &str) -> String {
        ERROR_HTML.replace("{error}", &html_escape(error))
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultTemplates;

impl HtmlTemplates for DefaultTemplates {}

fn html_escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#x27;")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_html_escape() {
        assert_eq!(html_escape("<script>"), "&lt;script&gt;");
        assert_eq!(html_escape("a & b"), "a &amp; b");
    }

    #[test]
    fn test_error_page_embeds_message() {
        let html = DefaultTemplates.error_html("bad <state>");
        assert!(html.contains("bad &lt;state&gt;"));
        assert!(!html.contains("{error}"));
        assert!(DefaultTemplates.success_html().contains("complete"));
    }
}
