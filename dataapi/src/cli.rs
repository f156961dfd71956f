//! Command-line argument parsing.
//!
//! Usage:
//!   dataapi [-c<config.toml>] [-r<script-root>] [-a<host:port>] [-d] [serve]
//!   dataapi [-c<config.toml>] [-r<script-root>] [-d] run <file-or-dir>

use std::path::PathBuf;

// ── Public types ──────────────────────────────────────────────────────────────

/// Parsed command-line arguments.
#[derive(Debug, Default)]
pub struct CliArgs {
    /// TOML config file (`-c<file>`).
    pub config: Option<PathBuf>,
    /// Script root override (`-r<dir>`).
    pub root: Option<PathBuf>,
    /// Listen address override (`-a<host:port>`).
    pub api_host: Option<String>,
    /// Debug logging (`-d`).
    pub debug: bool,
    /// What to do.
    pub command: Command,
}

/// The sub-command.
#[derive(Debug, Default, PartialEq, Eq)]
pub enum Command {
    /// Serve the HTTP API (default).
    #[default]
    Serve,
    /// Evaluate one script file or directory and exit.
    Run(String),
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

        // `--` ends flag processing.
        if arg == "--" {
            i += 1;
            positional.extend(argv[i..].iter().cloned());
            break;
        }

        // Non-flag argument.
        if !arg.starts_with('-') || arg == "-" {
            positional.push(arg.to_owned());
            i += 1;
            continue;
        }

        // Flag argument: iterate over characters after the leading `-`.
        let chars: Vec<char> = arg[1..].chars().collect();
        let mut j = 0;
        while j < chars.len() {
            let flag = chars[j];
            match flag {
                'd' => args.debug = true,

                // Flags taking a value, embedded (-c<file>) or separate (-c <file>).
                'c' | 'r' | 'a' => {
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
                        'r' => args.root = Some(PathBuf::from(value)),
                        _ => args.api_host = Some(value),
                    }
                }

                c => return Err(format!("unknown option: -{c}")),
            }
            j += 1;
        }
        i += 1;
    }

    // Positional arguments → sub-command.
    let mut positional = positional.into_iter();
    args.command = match positional.next().as_deref() {
        None | Some("serve") => Command::Serve,
        Some("run") => {
            let path = positional
                .next()
                .ok_or_else(|| "run requires a script path".to_owned())?;
            Command::Run(path)
        }
        Some(other) => return Err(format!("unknown command: {other}")),
    };
    let rest = positional.count();
    if rest > 0 {
        return Err(format!("too many arguments ({rest} extra)"));
    }

    Ok(args)
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn argv(args: &[&str]) -> Vec<String> {
        args.iter().map(|&s| s.to_owned()).collect()
    }

    #[test]
    fn empty_args_serve() {
        let a = parse_argv(&argv(&[])).unwrap();
        assert_eq!(a.command, Command::Serve);
        assert!(a.config.is_none());
        assert!(!a.debug);
    }

    #[test]
    fn run_command() {
        let a = parse_argv(&argv(&["run", "cascadingerrors"])).unwrap();
        assert_eq!(a.command, Command::Run("cascadingerrors".into()));
    }

    #[test]
    fn run_requires_path() {
        assert!(parse_argv(&argv(&["run"])).is_err());
    }

    #[test]
    fn config_embedded() {
        let a = parse_argv(&argv(&["-cdataapi.toml", "serve"])).unwrap();
        assert_eq!(a.config, Some(PathBuf::from("dataapi.toml")));
    }

    #[test]
    fn root_separate() {
        let a = parse_argv(&argv(&["-r", "/srv/scripts", "run", "a.txt"])).unwrap();
        assert_eq!(a.root, Some(PathBuf::from("/srv/scripts")));
        assert_eq!(a.command, Command::Run("a.txt".into()));
    }

    #[test]
    fn combined_debug_and_value() {
        let a = parse_argv(&argv(&["-da127.0.0.1:9000"])).unwrap();
        assert!(a.debug);
        assert_eq!(a.api_host.as_deref(), Some("127.0.0.1:9000"));
    }

    #[test]
    fn missing_flag_value() {
        assert!(parse_argv(&argv(&["-a"])).is_err());
    }

    #[test]
    fn too_many_positional() {
        assert!(parse_argv(&argv(&["run", "a", "b"])).is_err());
        assert!(parse_argv(&argv(&["serve", "x"])).is_err());
    }

    #[test]
    fn unknown_flag_and_command() {
        assert!(parse_argv(&argv(&["-z"])).is_err());
        assert!(parse_argv(&argv(&["deploy"])).is_err());
    }
}
