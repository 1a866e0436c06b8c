//! Engine configuration file parser.
//!
//! The file uses the same directive syntax as the rest of the site tooling:
//!
//! | Directive | Action |
//! |-----------|--------|
//! | `/set <name>=<value>` or `/set <name> <value>` | set a setting |
//! | Lines starting with `;` | comment, ignored |
//! | Any other `/command` | silently skipped |
//!
//! Unknown setting names and unparseable values are reported per line and
//! leave the default in place.

use std::path::Path;
use std::time::Duration;

use thiserror::Error;

// ── Public API ────────────────────────────────────────────────────────────────

/// A non-fatal error encountered while loading a config file.
#[derive(Debug, Error)]
#[error("line {line}: {message}")]
pub struct ConfigError {
    pub line: usize,
    pub message: String,
}

/// Site settings consulted by the interpreter.
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    /// Root of permalinks: `{base_url}/@{user}/{id}`.
    pub base_url: String,
    pub cloud_root: String,
    pub blog_root: String,
    /// Maximum nesting of reentrant invocations (`parent:publish`).
    pub max_depth: usize,
    /// Service account that sends `announce` broadcasts.
    pub announce_service: String,
    /// Domains (and their subdomains) admin filters never act on.
    pub excluded_domains: Vec<String>,
    /// Lifespans shorter than this are ignored.
    pub min_lifespan: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            base_url: "https://monsterpit.net".into(),
            cloud_root: "https://monsterpit.cloud/~/".into(),
            blog_root: "https://monsterpit.blog/~/".into(),
            max_depth: 4,
            announce_service: "announcements".into(),
            excluded_domains: [
                "tailma.ws",
                "monsterpit.net",
                "monsterpit.cloud",
                "monsterpit.gallery",
                "monsterpit.blog",
            ]
            .into_iter()
            .map(String::from)
            .collect(),
            min_lifespan: Duration::from_secs(30),
        }
    }
}

impl Config {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a config string.
    ///
    /// Returns the config and a list of any errors on recognised lines.
    pub fn load_str(s: &str) -> (Self, Vec<ConfigError>) {
        let mut config = Config::new();
        let mut errors = Vec::new();

        for (i, raw) in s.lines().enumerate() {
            let lineno = i + 1;
            let line = raw.trim();

            if line.is_empty() || line.starts_with(';') {
                continue;
            }

            let Some(rest) = line.strip_prefix('/') else { continue };

            let (cmd, args_str) = rest
                .split_once(|c: char| c.is_ascii_whitespace())
                .unwrap_or((rest, ""));

            if cmd == "set" {
                let tokens = split_args(args_str.trim());
                if let Err(message) = config.parse_set(&tokens) {
                    errors.push(ConfigError { line: lineno, message });
                }
            }
        }

        (config, errors)
    }

    /// Read and parse a config file from disk.
    pub fn load_file(path: &Path) -> std::io::Result<(Self, Vec<ConfigError>)> {
        let s = std::fs::read_to_string(path)?;
        Ok(Self::load_str(&s))
    }

    /// Apply one setting by name.
    pub fn apply(&mut self, name: &str, value: &str) -> Result<(), String> {
        match name {
            "base_url" => self.base_url = value.trim_end_matches('/').to_owned(),
            "cloud_root" => self.cloud_root = value.to_owned(),
            "blog_root" => self.blog_root = value.to_owned(),
            "max_depth" => {
                self.max_depth = value
                    .parse()
                    .map_err(|_| format!("max_depth: not a count: '{value}'"))?;
            }
            "announce_service" => {
                if value.is_empty() {
                    return Err("announce_service: cannot be empty".into());
                }
                self.announce_service = value.to_owned();
            }
            "excluded_domains" => {
                self.excluded_domains = value
                    .split(|c: char| c == ',' || c.is_whitespace())
                    .filter(|d| !d.is_empty())
                    .map(str::to_ascii_lowercase)
                    .collect();
            }
            "min_lifespan" => {
                let secs: u64 = value
                    .parse()
                    .map_err(|_| format!("min_lifespan: not a number of seconds: '{value}'"))?;
                self.min_lifespan = Duration::from_secs(secs);
            }
            _ => return Err(format!("unknown setting '{name}'")),
        }
        Ok(())
    }

    /// Permalink of a post.
    pub fn permalink(&self, user: &str, id: impl std::fmt::Display) -> String {
        format!("{}/@{}/{}", self.base_url, user, id)
    }

    pub fn cloud_url(&self, user: &str) -> String {
        format!("{}{}", self.cloud_root, user)
    }

    pub fn blog_url(&self, user: &str) -> String {
        format!("{}{}", self.blog_root, user)
    }

    /// Returns `true` if `domain` is, or is under, an excluded domain.
    pub fn is_excluded(&self, domain: &str) -> bool {
        self.excluded_domains.iter().any(|ex| {
            domain == ex || domain.strip_suffix(ex.as_str()).is_some_and(|rest| rest.ends_with('.'))
        })
    }

    /// Parse `/set <name>=<value>` or `/set <name> <value>`.
    fn parse_set(&mut self, tokens: &[String]) -> Result<(), String> {
        if tokens.is_empty() {
            return Err("/set: requires an argument".into());
        }

        let (name, value) = if let Some((name, value)) = tokens[0].split_once('=') {
            (name.to_owned(), value.to_owned())
        } else if tokens.len() >= 2 {
            (tokens[0].clone(), tokens[1..].join(" "))
        } else {
            return Err(format!("/set: missing value for '{}'", tokens[0]));
        };

        if name.is_empty() {
            return Err("/set: setting name cannot be empty".into());
        }

        self.apply(&name, &value)
    }
}

// ── Argument tokenizer ────────────────────────────────────────────────────────

/// Split `s` into whitespace-delimited tokens, honouring double-quoted strings
/// and `\"` escapes within them.
fn split_args(s: &str) -> Vec<String> {
    let mut args: Vec<String> = Vec::new();
    let mut cur = String::new();
    let mut in_quotes = false;
    let mut chars = s.chars();

    while let Some(ch) = chars.next() {
        match ch {
            '"' => in_quotes = !in_quotes,
            '\\' if in_quotes => {
                if let Some(escaped) = chars.next() {
                    cur.push(escaped);
                }
            }
            c if c.is_ascii_whitespace() && !in_quotes => {
                if !cur.is_empty() {
                    args.push(std::mem::take(&mut cur));
                }
            }
            c => cur.push(c),
        }
    }
    if !cur.is_empty() {
        args.push(cur);
    }
    args
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    // -- split_args -----------------------------------------------------------

    #[test]
    fn split_simple() {
        assert_eq!(split_args("foo bar baz"), ["foo", "bar", "baz"]);
    }

    #[test]
    fn split_quoted_spaces() {
        assert_eq!(split_args(r#"excluded_domains "a.example b.example""#), [
            "excluded_domains",
            "a.example b.example"
        ]);
    }

    #[test]
    fn split_escaped_quote_inside_quotes() {
        assert_eq!(split_args(r#""say \"hi\"""#), [r#"say "hi""#]);
    }

    // -- /set -----------------------------------------------------------------

    #[test]
    fn defaults() {
        let cfg = Config::default();
        assert_eq!(cfg.max_depth, 4);
        assert_eq!(cfg.permalink("alice", 42), "https://monsterpit.net/@alice/42");
        assert_eq!(cfg.cloud_url("alice"), "https://monsterpit.cloud/~/alice");
        assert_eq!(cfg.blog_url("alice"), "https://monsterpit.blog/~/alice");
    }

    #[test]
    fn set_equals_syntax() {
        let (cfg, errs) = Config::load_str("/set max_depth=2");
        assert!(errs.is_empty(), "{errs:?}");
        assert_eq!(cfg.max_depth, 2);
    }

    #[test]
    fn set_space_syntax() {
        let (cfg, errs) = Config::load_str("/set announce_service herald");
        assert!(errs.is_empty(), "{errs:?}");
        assert_eq!(cfg.announce_service, "herald");
    }

    #[test]
    fn base_url_drops_trailing_slash() {
        let (cfg, errs) = Config::load_str("/set base_url=https://pit.example/");
        assert!(errs.is_empty(), "{errs:?}");
        assert_eq!(cfg.permalink("bob", 1), "https://pit.example/@bob/1");
    }

    #[test]
    fn excluded_domains_list() {
        let (cfg, errs) = Config::load_str("/set excluded_domains home.example, friends.example");
        assert!(errs.is_empty(), "{errs:?}");
        assert_eq!(cfg.excluded_domains, ["home.example", "friends.example"]);
        assert!(cfg.is_excluded("home.example"));
        assert!(cfg.is_excluded("cdn.home.example"));
        assert!(!cfg.is_excluded("notfriends.example"));
    }

    #[test]
    fn bad_value_keeps_default() {
        let (cfg, errs) = Config::load_str("/set max_depth=lots");
        assert_eq!(errs.len(), 1);
        assert_eq!(errs[0].line, 1);
        assert_eq!(cfg.max_depth, 4);
    }

    #[test]
    fn unknown_setting_is_error() {
        let (_, errs) = Config::load_str("\n/set colour=blue");
        assert_eq!(errs.len(), 1);
        assert_eq!(errs[0].to_string(), "line 2: unknown setting 'colour'");
    }

    // -- Comments & skipping --------------------------------------------------

    #[test]
    fn comments_and_unknown_directives_ignored() {
        let (cfg, errs) = Config::load_str(
            ";; site settings\n\
             ; another comment\n\
             /def -i something = whatever\n\
             /set min_lifespan=60",
        );
        assert!(errs.is_empty(), "{errs:?}");
        assert_eq!(cfg.min_lifespan, Duration::from_secs(60));
    }

    #[test]
    fn load_file_reads_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bangtags.conf");
        std::fs::write(&path, "/set cloud_root=https://cloud.example/\n").unwrap();
        let (cfg, errs) = Config::load_file(&path).unwrap();
        assert!(errs.is_empty(), "{errs:?}");
        assert_eq!(cfg.cloud_url("x"), "https://cloud.example/x");
    }
}
