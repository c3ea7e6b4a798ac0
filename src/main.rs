mod cli;
mod commands;
mod conditions;
mod config;
mod dynamic;
mod hooks;
mod matcher;
mod telemetry;

use std::io::Read;

fn main() {
    let args: Vec<String> = std::env::args().collect();

    // Hook path: `skill-bus hook <event>` with the event JSON on stdin.
    // This path never exits non-zero; a failed dispatch just means the
    // skill loads without injected context.
    if args.len() >= 2 && args[1] == "hook" {
        let event_name = args.get(2).map(|s| s.as_str()).unwrap_or("");
        let mut stdin = String::new();
        let _ = std::io::stdin().read_to_string(&mut stdin);
        if let Ok((stdout, _)) = hooks::dispatcher::dispatch_from_cli(event_name, &stdin) {
            if !stdout.is_empty() {
                println!("{}", stdout);
            }
        }
        return;
    }

    match cli::router::run_cli(args) {
        Ok((output, code)) => {
            if !output.is_empty() {
                println!("{}", output);
            }
            if code != 0 {
                std::process::exit(code);
            }
        }
        Err(message) => {
            eprintln!("{}", message);
            std::process::exit(1);
        }
    }
}
