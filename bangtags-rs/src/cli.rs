//! Command-line argument parsing.
//!
//! Usage:
//!   bangtags [-c<config>] [-V<varsfile>] [-u<user>] [-ajm] [<file>]

use std::path::PathBuf;

use directories::ProjectDirs;

// ── Public types ──────────────────────────────────────────────────────────────

/// Parsed command-line arguments.
#[derive(Debug)]
pub struct CliArgs {
    /// Engine config file (`-c<file>`).
    pub config: Option<PathBuf>,
    /// Variable store override (`-V<file>`).
    pub vars_file: Option<PathBuf>,
    /// Author of the post (`-u<user>`).
    pub user: String,
    /// Run with administrator authorization (`-a`).
    pub admin: bool,
    /// Run with moderator authorization (`-m`).
    pub moderator: bool,
    /// Print the processed post as JSON (`-j`).
    pub json: bool,
    /// Post text source; stdin when absent or `-`.
    pub input: Option<PathBuf>,
}

impl Default for CliArgs {
    fn default() -> Self {
        Self {
            config: None,
            vars_file: None,
            user: "local".to_owned(),
            admin: false,
            moderator: false,
            json: false,
            input: None,
        }
    }
}

// ── Parsing ───────────────────────────────────────────────────────────────────

/// Parse `std::env::args()` and return [`CliArgs`] or an error message.
pub fn parse_args() -> Result<CliArgs, String> {
    let raw: Vec<String> = std::env::args().collect();
    parse_argv(raw.get(1..).unwrap_or_default())
}

/// Parse a slice of argument strings (exposed for testing).
pub fn parse_argv(argv: &[String]) -> Result<CliArgs, String> {
    let mut args = CliArgs::default();
    let mut positional: Vec<String> = Vec::new();
    let mut i = 0;

    while i < argv.len() {
        let arg = argv[i].as_str();

        if arg == "--" {
            positional.extend(argv[i + 1..].iter().cloned());
            break;
        }

        if !arg.starts_with('-') || arg == "-" {
            positional.push(arg.to_owned());
            i += 1;
            continue;
        }

        let chars: Vec<char> = arg[1..].chars().collect();
        let mut j = 0;
        while j < chars.len() {
            match chars[j] {
                'a' => args.admin = true,
                'm' => args.moderator = true,
                'j' => args.json = true,

                // Options taking a value, embedded (`-uNAME`) or separate (`-u NAME`).
                flag @ ('c' | 'V' | 'u') => {
                    let value = if j + 1 < chars.len() {
                        let s: String = chars[j + 1..].iter().collect();
                        j = chars.len();
                        s
                    } else if i + 1 < argv.len() {
                        i += 1;
                        argv[i].clone()
                    } else {
                        return Err(format!("-{flag} requires an argument"));
                    };
                    match flag {
                        'c' => args.config = Some(PathBuf::from(value)),
                        'V' => args.vars_file = Some(PathBuf::from(value)),
                        _ => {
                            let user = value.trim_start_matches('@');
                            if user.is_empty() {
                                return Err("-u requires a user name".to_owned());
                            }
                            args.user = user.to_owned();
                        }
                    }
                }

                c => return Err(format!("unknown option: -{c}")),
            }
            j += 1;
        }
        i += 1;
    }

    match positional.len() {
        0 => {}
        1 => {
            let file = positional.remove(0);
            if file != "-" {
                args.input = Some(PathBuf::from(file));
            }
        }
        n => return Err(format!("too many arguments ({n})")),
    }

    Ok(args)
}

// ── Path helpers ──────────────────────────────────────────────────────────────

/// Determine the variable store file.
///
/// Priority: `-V<file>` → `BANGTAGS_VARS` env var → `vars.json` in the
/// platform data directory → `./bangtags-vars.json`.
pub fn resolve_vars_file(cli_override: Option<&PathBuf>) -> PathBuf {
    if let Some(path) = cli_override {
        return path.clone();
    }
    if let Ok(path) = std::env::var("BANGTAGS_VARS") {
        return PathBuf::from(path);
    }
    ProjectDirs::from("net", "monsterpit", "bangtags")
        .map(|dirs| dirs.data_dir().join("vars.json"))
        .unwrap_or_else(|| PathBuf::from("bangtags-vars.json"))
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn argv(args: &[&str]) -> Vec<String> {
        args.iter().map(|&s| s.to_owned()).collect()
    }

    #[test]
    fn empty_args() {
        let a = parse_argv(&argv(&[])).unwrap();
        assert_eq!(a.user, "local");
        assert!(!a.admin && !a.json);
        assert!(a.input.is_none());
    }

    #[test]
    fn file_positional() {
        let a = parse_argv(&argv(&["post.txt"])).unwrap();
        assert_eq!(a.input, Some(PathBuf::from("post.txt")));
    }

    #[test]
    fn dash_means_stdin() {
        let a = parse_argv(&argv(&["-"])).unwrap();
        assert!(a.input.is_none());
    }

    #[test]
    fn combined_bool_flags() {
        let a = parse_argv(&argv(&["-ajm"])).unwrap();
        assert!(a.admin && a.json && a.moderator);
    }

    #[test]
    fn user_embedded_and_separate() {
        assert_eq!(parse_argv(&argv(&["-u@alice"])).unwrap().user, "alice");
        assert_eq!(parse_argv(&argv(&["-u", "bob"])).unwrap().user, "bob");
    }

    #[test]
    fn flag_cluster_ending_in_value() {
        let a = parse_argv(&argv(&["-ajVvars.json"])).unwrap();
        assert!(a.admin && a.json);
        assert_eq!(a.vars_file, Some(PathBuf::from("vars.json")));
    }

    #[test]
    fn config_separate() {
        let a = parse_argv(&argv(&["-c", "site.conf", "post.txt"])).unwrap();
        assert_eq!(a.config, Some(PathBuf::from("site.conf")));
        assert_eq!(a.input, Some(PathBuf::from("post.txt")));
    }

    #[test]
    fn missing_value() {
        assert!(parse_argv(&argv(&["-c"])).is_err());
        assert!(parse_argv(&argv(&["-u", ""])).is_err());
    }

    #[test]
    fn too_many_positional() {
        assert!(parse_argv(&argv(&["a", "b"])).is_err());
    }

    #[test]
    fn unknown_flag() {
        assert!(parse_argv(&argv(&["-z"])).is_err());
    }

    #[test]
    fn vars_file_override_wins() {
        let path = PathBuf::from("/tmp/v.json");
        assert_eq!(resolve_vars_file(Some(&path)), path);
    }
}
