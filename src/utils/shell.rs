//! Shell escaping and quoting utilities.

/// Escape a value for use inside single quotes.
/// Replaces `'` with `'\''` (end quote, escaped quote, start quote).
pub fn escape_single_quote_content(value: &str) -> String {
    value.replace('\'', "'\\''")
}

/// Quote a single argument for shell execution.
/// - Empty strings become `''`
/// - Strings with shell metacharacters are wrapped in single quotes
/// - Embedded single quotes are escaped
pub fn quote_arg(arg: &str) -> String {
    if arg.is_empty() {
        return "''".to_string();
    }

    const SHELL_META: &[char] = &[
        ' ', '\t', '\n', '\'', '"', '\\', '$', '`', '!', '*', '?', '[', ']', '(', ')', '{', '}',
        '<', '>', '|', '&', ';', '#', '~',
    ];

    if !arg.contains(SHELL_META) {
        return arg.to_string();
    }

    format!("'{}'", escape_single_quote_content(arg))
}

/// Placeholder shown in place of secret values.
pub const REDACTED: &str = "<redacted>";

/// True for environment keys that hold credentials.
pub fn is_secret_key(key: &str) -> bool {
    let key = key.to_ascii_uppercase();
    key == "PRIVATE_KEY"
        || key == "API_KEY"
        || key.ends_with("_PRIVATE_KEY")
        || key.ends_with("_API_KEY")
        || key.ends_with("_SECRET")
}

/// Keep only the origin of a URL. Provider keys often sit in the path or query.
pub fn redact_url(raw: &str) -> String {
    match reqwest::Url::parse(raw) {
        Ok(url) if url.path() == "/" && url.query().is_none() => url.origin().ascii_serialization(),
        Ok(url) => format!("{}/{}", url.origin().ascii_serialization(), REDACTED),
        Err(_) => REDACTED.to_string(),
    }
}

/// Render a program invocation for logs and error details. The value after
/// `--private-key` is masked and `--rpc-url` is cut down to its origin.
pub fn display_invocation(program: &str, args: &[String]) -> String {
    let mut parts = vec![quote_arg(program)];
    let mut previous: Option<&str> = None;
    for arg in args {
        let shown = match previous {
            Some("--private-key") => REDACTED.to_string(),
            Some("--rpc-url") => quote_arg(&redact_url(arg)),
            _ => quote_arg(arg),
        };
        parts.push(shown);
        previous = Some(arg.as_str());
    }
    parts.join(" ")
}
