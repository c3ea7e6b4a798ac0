//! CLI command routing. The hook entrypoint (`skill-bus hook <event>`) is
//! handled in main before this router runs; everything else lands here.

use crate::commands::{self, utils};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    List,
    Simulate,
    Status,
    Inserts,
    Set,
    AddInsert,
    Stats,
}

impl Command {
    pub fn from_arg(s: &str) -> Option<Command> {
        match s {
            "list" => Some(Command::List),
            "simulate" => Some(Command::Simulate),
            "status" => Some(Command::Status),
            "inserts" => Some(Command::Inserts),
            "set" => Some(Command::Set),
            "add-insert" => Some(Command::AddInsert),
            "stats" => Some(Command::Stats),
            _ => None,
        }
    }

    /// Canonical CLI name for this command.
    pub fn name(&self) -> &'static str {
        match self {
            Command::List => "list",
            Command::Simulate => "simulate",
            Command::Status => "status",
            Command::Inserts => "inserts",
            Command::Set => "set",
            Command::AddInsert => "add-insert",
            Command::Stats => "stats",
        }
    }

    fn all_names() -> &'static [&'static str] {
        &["list", "simulate", "status", "inserts", "set", "add-insert", "stats"]
    }

    /// Suggest the closest command name for a typo.
    pub fn suggest(input: &str) -> Option<&'static str> {
        let mut best: Option<(&str, usize)> = None;
        for name in Self::all_names() {
            let dist = edit_distance(input, name);
            if dist <= 3 && best.map(|(_, d)| dist < d).unwrap_or(true) {
                best = Some((name, dist));
            }
        }
        best.map(|(name, _)| name)
    }
}

fn edit_distance(a: &str, b: &str) -> usize {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    let mut dp = vec![vec![0usize; b.len() + 1]; a.len() + 1];
    for i in 0..=a.len() {
        dp[i][0] = i;
    }
    for j in 0..=b.len() {
        dp[0][j] = j;
    }
    for i in 1..=a.len() {
        for j in 1..=b.len() {
            let cost = if a[i - 1] == b[j - 1] { 0 } else { 1 };
            dp[i][j] = (dp[i - 1][j] + 1)
                .min(dp[i][j - 1] + 1)
                .min(dp[i - 1][j - 1] + cost);
        }
    }
    dp[a.len()][b.len()]
}

pub fn run_cli(args: Vec<String>) -> Result<(String, i32), String> {
    if args.len() < 2 {
        return Err(
            "Usage: skill-bus <command> [args...]\nCommands: list, simulate, status, inserts, set, add-insert, stats, hook"
                .to_string(),
        );
    }

    let cwd = utils::cwd_from_args(&args);
    match Command::from_arg(args[1].as_str()) {
        Some(Command::List) => commands::list::execute(&args, &cwd),
        Some(Command::Simulate) => commands::simulate::execute(&args, &cwd),
        Some(Command::Status) => commands::status::execute(&args, &cwd),
        Some(Command::Inserts) => commands::inserts::execute(&args, &cwd),
        Some(Command::Set) => commands::set_setting::execute(&args, &cwd),
        Some(Command::AddInsert) => commands::add_insert::execute(&args, &cwd),
        Some(Command::Stats) => commands::stats::execute(&args, &cwd),
        None => match Command::suggest(args[1].as_str()) {
            Some(suggestion) => Err(format!(
                "Unknown command: {} (did you mean '{}'?)",
                args[1], suggestion
            )),
            None => Err(format!("Unknown command: {}", args[1])),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_arg_round_trip() {
        for name in Command::all_names() {
            let command = Command::from_arg(name).unwrap();
            assert_eq!(command.name(), *name);
        }
        assert!(Command::from_arg("bogus").is_none());
    }

    #[test]
    fn test_suggest_close_typo() {
        assert_eq!(Command::suggest("simulat"), Some("simulate"));
        assert_eq!(Command::suggest("stauts"), Some("status"));
        assert_eq!(Command::suggest("add-inserts"), Some("add-insert"));
        assert_eq!(Command::suggest("completely-different"), None);
    }

    #[test]
    fn test_run_cli_requires_command() {
        let result = run_cli(vec!["skill-bus".to_string()]);
        assert!(result.is_err());
        assert!(result.unwrap_err().contains("Usage:"));
    }

    #[test]
    fn test_run_cli_unknown_command_suggests() {
        let result = run_cli(vec!["skill-bus".to_string(), "statu".to_string()]);
        let err = result.unwrap_err();
        assert!(err.contains("Unknown command: statu"));
        assert!(err.contains("did you mean 'status'?"));
    }

    #[test]
    fn test_edit_distance() {
        assert_eq!(edit_distance("status", "status"), 0);
        assert_eq!(edit_distance("statu", "status"), 1);
        assert_eq!(edit_distance("", "abc"), 3);
    }
}
