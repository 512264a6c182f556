//! `${VAR}` expansion for config files.
//!
//! Connection strings usually carry credentials, so they are kept out of the
//! YAML and pulled from the environment:
//! - `$VAR` / `${VAR}`: required, unset is an error
//! - `${VAR:-fallback}`: fallback when VAR is unset or empty
//! - `${VAR-fallback}`: fallback only when VAR is unset
//! - `$$`: a literal `$`

use std::env;
use std::sync::LazyLock;

use regex::{Captures, Regex};

static REFERENCE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?x)
        \$\$
        |
        \$\{ (?P<braced>[A-Za-z_][A-Za-z0-9_]*) (?: (?P<op>:?-) (?P<fallback>[^}]*) )? \}
        |
        \$(?P<bare>[A-Za-z_][A-Za-z0-9_]*)
        ",
    )
    .expect("static pattern is valid")
});

/// How a missing or empty variable is handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Fallback<'a> {
    None,
    /// `${VAR-x}`
    IfUnset(&'a str),
    /// `${VAR:-x}`
    IfUnsetOrEmpty(&'a str),
}

/// Outcome of expanding a config document.
#[derive(Debug)]
pub struct Expanded {
    /// Text with every resolvable reference substituted.
    pub text: String,
    /// One message per unresolved or rejected reference.
    pub problems: Vec<String>,
}

impl Expanded {
    /// True when every reference resolved.
    pub fn is_clean(&self) -> bool {
        self.problems.is_empty()
    }
}

/// Expand environment references in `input`.
///
/// Every problem is collected rather than stopping at the first, so a config
/// with several missing variables reports all of them.
pub fn expand_env(input: &str) -> Expanded {
    let mut problems = Vec::new();
    let text = REFERENCE
        .replace_all(input, |caps: &Captures| resolve(caps, &mut problems))
        .into_owned();
    Expanded { text, problems }
}

fn resolve(caps: &Captures, problems: &mut Vec<String>) -> String {
    let whole = &caps[0];
    if whole == "$$" {
        return "$".to_string();
    }

    let Some(name) = caps.name("braced").or_else(|| caps.name("bare")) else {
        return whole.to_string();
    };
    let name = name.as_str();
    let fallback = match (caps.name("op"), caps.name("fallback")) {
        (Some(op), Some(value)) if op.as_str() == ":-" => Fallback::IfUnsetOrEmpty(value.as_str()),
        (Some(_), Some(value)) => Fallback::IfUnset(value.as_str()),
        _ => Fallback::None,
    };

    match (env::var(name), fallback) {
        (Ok(value), _) if value.contains(['\n', '\r']) => {
            problems.push(format!(
                "environment variable '{name}' contains newlines, which is not allowed"
            ));
            whole.to_string()
        }
        (Ok(value), Fallback::IfUnsetOrEmpty(default)) if value.is_empty() => default.to_string(),
        (Ok(value), _) => value,
        (Err(_), Fallback::IfUnset(default) | Fallback::IfUnsetOrEmpty(default)) => {
            default.to_string()
        }
        (Err(_), Fallback::None) => {
            problems.push(format!("environment variable '{name}' is not set"));
            whole.to_string()
        }
    }
}
