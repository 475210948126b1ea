//! `${env:NAME}` placeholder and `~` expansion for configuration strings.

use std::env;

const PLACEHOLDER_OPEN: &str = "${env:";

/// Replace every `${env:NAME}` with the value of `NAME`.
///
/// Placeholders naming unset variables, and an unterminated trailing
/// placeholder, are copied through unchanged.
pub fn expand_env_placeholders(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut rest = input;

    while let Some(start) = rest.find(PLACEHOLDER_OPEN) {
        out.push_str(&rest[..start]);
        let tail = &rest[start..];
        let Some(close) = tail.find('}') else {
            out.push_str(tail);
            return out;
        };
        let name = &tail[PLACEHOLDER_OPEN.len()..close];
        match env::var(name) {
            Ok(value) => out.push_str(&value),
            Err(_) => out.push_str(&tail[..=close]),
        }
        rest = &tail[close + 1..];
    }

    out.push_str(rest);
    out
}

/// Expand `~` or a leading `~/` (`~\` on Windows) to the home directory.
///
/// `~user` forms are not expanded.
pub fn expand_tilde(input: &str) -> String {
    let Some(tail) = input.strip_prefix('~') else {
        return input.to_string();
    };
    if !(tail.is_empty() || tail.starts_with('/') || tail.starts_with('\\')) {
        return input.to_string();
    }
    match dirs::home_dir() {
        Some(home) => format!("{}{tail}", home.display()),
        None => input.to_string(),
    }
}

/// Normalize a local path setting: trim, drop surrounding quotes, then
/// expand placeholders and `~`.
pub fn expand_local_path(input: &str) -> String {
    let unquoted = input.trim().trim_matches('"').trim_matches('\'');
    expand_tilde(&expand_env_placeholders(unquoted))
}
