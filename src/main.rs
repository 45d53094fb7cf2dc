//! gshell - an interactive POSIX-style shell
//!
//! Usage:
//!   gshell                 Start the interactive REPL
//!   gshell -c "cmd"        Execute a single command
//!   gshell script [args]   Run a script file ($0..$N bound)
//!   gshell init            Delegated to the setup tool (not bundled)
//!   gshell completions SH  Delegated to the completion generator

use gshell::{Shell, ShellConfig};
use std::env;
use std::process::ExitCode;

const VERSION: &str = env!("CARGO_PKG_VERSION");

fn print_help() {
    println!(
        r#"gshell {}

USAGE:
    gshell                       Start the interactive REPL
    gshell -c <command>          Execute a single command and exit
    gshell --command <command>   Same as -c
    gshell <script> [args...]    Run a script file ($0..$N bound)
    gshell init [--force]        First-run setup (external tool)
    gshell completions <shell>   Emit a completion script (external tool)
    gshell --help                Show this help
    gshell --version             Show the version

ENVIRONMENT:
    GSHELL_CONFIG    Overrides the rc file path
    NO_COLOR         Disables ANSI color in the default prompt

FILES:
    ~/.gshellrc.rhai   Scripted rc file, run once at startup
    ~/.gshellrc        Plain rc file, one command per line
    ~/.gshell_history  Command history, mode 0600
"#,
        VERSION
    );
}

/// Clamp a shell status into the 0..=255 range the OS can carry.
fn clamp_exit(status: i32) -> u8 {
    if (0..=255).contains(&status) {
        status as u8
    } else {
        255
    }
}

fn main() -> ExitCode {
    let args: Vec<String> = env::args().collect();

    let status = match args.get(1).map(|s| s.as_str()) {
        None => {
            let config = ShellConfig::from_env();
            Shell::new(config).run_interactive()
        }
        Some("--help") | Some("-h") => {
            print_help();
            0
        }
        Some("--version") | Some("-V") => {
            println!("gshell {}", VERSION);
            0
        }
        Some("-c") | Some("--command") => {
            if args.len() < 3 {
                eprintln!("gshell: -c requires a command string");
                2
            } else {
                let command = args[2..].join(" ");
                let config = ShellConfig {
                    interactive: false,
                    ..ShellConfig::from_env()
                };
                Shell::new(config).run_command(&command)
            }
        }
        Some("init") => {
            eprintln!("gshell: the setup tool is not bundled with this build");
            1
        }
        Some("completions") => {
            eprintln!("gshell: the completion generator is not bundled with this build");
            1
        }
        Some(path) => {
            let config = ShellConfig {
                interactive: false,
                ..ShellConfig::from_env()
            };
            Shell::new(config).run_script(path, &args[2..])
        }
    };

    ExitCode::from(clamp_exit(status))
}
