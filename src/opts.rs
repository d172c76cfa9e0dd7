//! CLI argument dispatch (C9, ambient): turns `argv` into a typed
//! [`Command`], the same shape `main` hands off to each component.

use std::path::PathBuf;

pub const USAGE: &str =
    "Usage: git fat [init|filter-clean|filter-smudge|status|push|pull|checkout|gc|verify|find|index-filter]";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Init,
    FilterClean,
    FilterSmudge,
    Status { all: bool },
    Push { all: bool },
    Pull { all: bool, rev: Option<String>, patterns: Vec<String> },
    Checkout,
    Gc,
    Verify,
    Find { threshold_bytes: u64 },
    IndexFilter { list_file: PathBuf, manage_gitattributes: bool },
}

/// Parses `args` (the program name already stripped, i.e. `argv[1..]`).
/// Returns `Err(message)` for a missing/unknown subcommand or malformed
/// arguments to a known one; `main` prints that message alongside
/// [`USAGE`] and exits 1.
pub fn parse(args: &[String]) -> Result<Command, String> {
    let Some(cmd) = args.first() else {
        return Err("no command given".to_string());
    };
    let rest = &args[1..];

    match cmd.as_str() {
        "init" => Ok(Command::Init),
        "filter-clean" => Ok(Command::FilterClean),
        "filter-smudge" => Ok(Command::FilterSmudge),
        "status" => Ok(Command::Status { all: rest.iter().any(|a| a == "--all") }),
        "push" => Ok(Command::Push { all: rest.iter().any(|a| a == "--all") }),
        "pull" => Ok(parse_pull(rest)),
        "checkout" => Ok(Command::Checkout),
        "gc" => Ok(Command::Gc),
        "verify" => Ok(Command::Verify),
        "find" => {
            let threshold = rest
                .first()
                .ok_or_else(|| "find requires a <threshold-bytes> argument".to_string())?;
            let threshold_bytes = threshold
                .parse::<u64>()
                .map_err(|_| format!("invalid threshold: {}", threshold))?;
            Ok(Command::Find { threshold_bytes })
        }
        "index-filter" => {
            let list_file = rest
                .first()
                .ok_or_else(|| "index-filter requires a <list-file> argument".to_string())?;
            let manage_gitattributes = rest.iter().any(|a| a == "--manage-gitattributes");
            Ok(Command::IndexFilter {
                list_file: PathBuf::from(list_file),
                manage_gitattributes,
            })
        }
        other => Err(format!("Unknown command: {}", other)),
    }
}

fn parse_pull(args: &[String]) -> Command {
    let all = args.iter().any(|a| a == "--all");
    let mut rev = None;
    for arg in args {
        if arg.starts_with('-') || arg.len() != 40 {
            continue;
        }
        rev = Some(arg.clone());
    }
    let patterns = match args.iter().position(|a| a == "--") {
        Some(idx) => args[idx + 1..].to_vec(),
        None => Vec::new(),
    };
    Command::Pull { all, rev, patterns }
}
