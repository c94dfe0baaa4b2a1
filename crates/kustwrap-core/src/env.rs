//! Caller-supplied environment and `$VAR` substitution
//!
//! Image overrides, label values and (optionally) annotation values may
//! reference variables such as `${APP_REVISION}`. Expansion follows shell
//! rules closely enough for those use cases:
//! - `$NAME` and `${NAME}` expand to the entry value, or the empty string
//! - `$$` expands to a literal `$`
//! - a `$` that is not followed by a name is left untouched
//! - malformed `${` and `${}` sequences are dropped

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::error::{CoreError, Result};

/// One environment variable
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnvEntry {
    pub name: String,
    pub value: String,
}

impl EnvEntry {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }

    /// Parse a `NAME=VALUE` string
    pub fn parse(entry: &str) -> Result<Self> {
        match entry.split_once('=') {
            Some((name, value)) if !name.is_empty() => Ok(Self::new(name, value)),
            _ => Err(CoreError::InvalidEnvEntry {
                entry: entry.to_string(),
            }),
        }
    }
}

/// Ordered list of environment entries
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Env(pub Vec<EnvEntry>);

impl Env {
    pub fn new() -> Self {
        Self(Vec::new())
    }

    /// Parse a list of `NAME=VALUE` strings
    pub fn parse_all<S: AsRef<str>>(entries: &[S]) -> Result<Self> {
        entries
            .iter()
            .map(|e| EnvEntry::parse(e.as_ref()))
            .collect::<Result<Vec<_>>>()
            .map(Self)
    }

    pub fn push(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.0.push(EnvEntry::new(name, value));
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Entries as `(name, value)` pairs, in insertion order
    pub fn environ(&self) -> Vec<(String, String)> {
        self.0
            .iter()
            .map(|e| (e.name.clone(), e.value.clone()))
            .collect()
    }

    /// Expand `$VAR` / `${VAR}` references; later entries win on duplicates
    pub fn envsubst(&self, s: &str) -> String {
        let values: HashMap<&str, &str> = self
            .0
            .iter()
            .map(|e| (e.name.as_str(), e.value.as_str()))
            .collect();

        expand(s, |name| {
            if name == "$" {
                "$".to_string()
            } else {
                values.get(name).map(|v| v.to_string()).unwrap_or_default()
            }
        })
    }
}

fn expand(s: &str, mapping: impl Fn(&str) -> String) -> String {
    let bytes = s.as_bytes();
    let mut out = String::with_capacity(s.len());
    let mut start = 0;
    let mut j = 0;

    while j < bytes.len() {
        if bytes[j] == b'$' && j + 1 < bytes.len() {
            out.push_str(&s[start..j]);
            let (name, width) = shell_name(&s[j + 1..]);
            match name {
                Some(name) => out.push_str(&mapping(name)),
                // Malformed braces are consumed
                None if width > 0 => {}
                None => out.push('$'),
            }
            j += width;
            start = j + 1;
        }
        j += 1;
    }

    out.push_str(&s[start.min(s.len())..]);
    out
}

/// Returns the variable name at the start of `s` and how many bytes it spans
fn shell_name(s: &str) -> (Option<&str>, usize) {
    let bytes = s.as_bytes();

    if bytes[0] == b'{' {
        if bytes.len() > 2 && is_special(bytes[1]) && bytes[2] == b'}' {
            return (Some(&s[1..2]), 3);
        }
        for (i, b) in bytes.iter().enumerate().skip(1) {
            if *b == b'}' {
                if i == 1 {
                    return (None, 2);
                }
                return (Some(&s[1..i]), i + 1);
            }
        }
        return (None, 1);
    }

    if is_special(bytes[0]) {
        return (Some(&s[0..1]), 1);
    }

    let len = bytes
        .iter()
        .take_while(|b| b.is_ascii_alphanumeric() || **b == b'_')
        .count();
    if len == 0 { (None, 0) } else { (Some(&s[..len]), len) }
}

fn is_special(b: u8) -> bool {
    matches!(b, b'*' | b'#' | b'$' | b'@' | b'!' | b'?' | b'-') || b.is_ascii_digit()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn env() -> Env {
        let mut env = Env::new();
        env.push("REVISION", "abc123");
        env.push("NAMESPACE", "prod");
        env
    }

    #[test]
    fn test_envsubst_braced_and_bare() {
        let env = env();
        assert_eq!(env.envsubst("app:${REVISION}"), "app:abc123");
        assert_eq!(env.envsubst("app:$REVISION"), "app:abc123");
        assert_eq!(env.envsubst("$NAMESPACE-$REVISION"), "prod-abc123");
    }

    #[test]
    fn test_envsubst_unknown_is_empty() {
        assert_eq!(env().envsubst("x-${MISSING}-y"), "x--y");
        assert_eq!(env().envsubst("x-$MISSING"), "x-");
    }

    #[test]
    fn test_envsubst_escapes_and_edge_cases() {
        let env = env();
        assert_eq!(env.envsubst("cost: $$5"), "cost: $5");
        assert_eq!(env.envsubst("trailing $"), "trailing $");
        assert_eq!(env.envsubst("a $ b"), "a $ b");
        assert_eq!(env.envsubst("empty ${}"), "empty ");
        assert_eq!(env.envsubst("open ${REVISION"), "open REVISION");
        assert_eq!(env.envsubst("no vars"), "no vars");
        assert_eq!(env.envsubst(""), "");
    }

    #[test]
    fn test_envsubst_later_entry_wins() {
        let mut env = env();
        env.push("REVISION", "def456");
        assert_eq!(env.envsubst("${REVISION}"), "def456");
    }

    #[test]
    fn test_parse_entries() {
        let env = Env::parse_all(&["A=1", "B=x=y", "C="]).unwrap();
        assert_eq!(
            env.environ(),
            vec![
                ("A".to_string(), "1".to_string()),
                ("B".to_string(), "x=y".to_string()),
                ("C".to_string(), String::new()),
            ]
        );

        assert!(EnvEntry::parse("novalue").is_err());
        assert!(EnvEntry::parse("=value").is_err());
    }
}
