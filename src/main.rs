//! iconsole - interactive command console
//!
//! Usage:
//!   iconsole                   Interactive session
//!   iconsole -c "command"      Execute single command
//!   iconsole --prompt NAME     Use NAME in the prompt

use std::env;
use std::fs;
use std::io::Write;

use anyhow::Result;
use colored::Colorize;

use interactive_console::config::ConsoleConfig;
use interactive_console::shell::input::CrosstermKeys;
use interactive_console::shell::terminal::{CrosstermTerminal, Terminal};
use interactive_console::{interrupt, logging, ExitReason, Session};

/// Ensure we have a console window (for double-click launch)
#[cfg(windows)]
fn ensure_console() {
    use windows_sys::Win32::System::Console::{AllocConsole, GetConsoleWindow};
    unsafe {
        if GetConsoleWindow().is_null() {
            AllocConsole();
        }
    }
}

#[cfg(not(windows))]
fn ensure_console() {}

/// Run the startup script, if there is one. Failures are reported and skipped.
fn load_startup_script<T: Terminal>(session: &mut Session<T>, config: &ConsoleConfig) {
    let Some(path) = config.startup_script.as_deref() else {
        return;
    };
    let Ok(content) = fs::read_to_string(path) else {
        return;
    };

    tracing::info!(script = %path.display(), "running startup script");
    match session.run_script(&content) {
        Ok(failures) => {
            for (line, report) in failures {
                eprintln!("iconsole: {}:{}: {}", path.display(), line, report);
            }
        }
        Err(e) => eprintln!("iconsole: {}: {}", path.display(), e),
    }
}

fn main() -> Result<()> {
    // Ensure we have a console (allows double-click to work)
    ensure_console();

    let args: Vec<String> = env::args().collect();
    let mut config = ConsoleConfig::from_env();
    let mut single_command: Option<String> = None;

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "-c" => {
                if i + 1 >= args.len() {
                    eprintln!("iconsole: -c requires an argument");
                    std::process::exit(1);
                }
                single_command = Some(args[i + 1..].join(" "));
                break;
            }
            "--prompt" => {
                let Some(name) = args.get(i + 1) else {
                    eprintln!("iconsole: --prompt requires an argument");
                    std::process::exit(1);
                };
                config.prompt = name.clone();
                i += 2;
            }
            "-h" | "--help" => {
                print_help();
                return Ok(());
            }
            "-v" | "--version" => {
                println!("iconsole v{}", env!("CARGO_PKG_VERSION"));
                return Ok(());
            }
            other => {
                eprintln!("iconsole: unknown option: {}", other);
                std::process::exit(1);
            }
        }
    }

    let log_guard = logging::init(&config)?;
    let runtime = tokio::runtime::Runtime::new()?;
    let code = runtime.block_on(run(config, single_command))?;
    drop(runtime);
    drop(log_guard);
    std::process::exit(code);
}

async fn run(config: ConsoleConfig, single_command: Option<String>) -> Result<i32> {
    let mut session = Session::new(config.clone(), CrosstermTerminal::stdout())?;
    load_startup_script(&mut session, &config);

    if let Some(cmd) = single_command {
        let outcome = session.execute_line(&cmd)?;
        return Ok(if outcome.is_success() { 0 } else { 1 });
    }
    if session.exit_requested() {
        return Ok(0);
    }

    let signals = tokio::spawn(interrupt::forward_ctrl_c(session.interrupt_router()));
    print_banner();
    let reason = session.start(CrosstermKeys).await?;
    signals.abort();

    let mut stdout = std::io::stdout();
    match reason {
        ExitReason::Forced => {
            writeln!(stdout, "^C")?;
            Ok(130)
        }
        ExitReason::Graceful | ExitReason::InputClosed => {
            writeln!(stdout)?;
            Ok(0)
        }
    }
}

fn print_help() {
    println!("{}", "iconsole - interactive command console".bold());
    println!();
    println!("Usage:");
    println!("  iconsole                   Start interactive session");
    println!("  iconsole -c \"command\"      Execute single command");
    println!("  iconsole --prompt NAME     Use NAME in the prompt");
    println!("  iconsole -h, --help        Show this help");
    println!("  iconsole -v, --version     Show version");
    println!();
    println!("Environment:");
    println!("  ICONSOLE_LOG               Write diagnostics to this file");
    println!("  ICONSOLE_LOG_LEVEL         trace, debug, info, warn or error");
    println!();
    println!("Lines of ~/.iconsolerc run before the first prompt.");
    println!("Type 'help' in the console for built-in commands.");
}

/// Left and right padding that centers `len` columns in `width`. Overlong text gets none.
fn centered(width: usize, len: usize) -> (usize, usize) {
    let left = width.saturating_sub(len) / 2;
    (left, width.saturating_sub(left + len))
}

/// Print the startup box banner
fn print_banner() {
    let version = env!("CARGO_PKG_VERSION");

    let tl = '\u{256D}';
    let tr = '\u{256E}';
    let bl = '\u{2570}';
    let br = '\u{256F}';
    let h = '\u{2500}';
    let v = '\u{2502}';

    let content_width: usize = 40;
    let title = format!(" iconsole v{} ", version);
    let (title_left, title_right) = centered(content_width, title.len());

    print!("{}", tl.to_string().bright_black());
    print!("{}", h.to_string().repeat(title_left).bright_black());
    print!("{}", title.bold().cyan());
    print!("{}", h.to_string().repeat(title_right).bright_black());
    println!("{}", tr.to_string().bright_black());

    let info = "Interactive command console";
    let (info_left, info_right) = centered(content_width, info.len());
    print!("{}", v.to_string().bright_black());
    print!("{}", " ".repeat(info_left));
    print!("{}", info.white());
    print!("{}", " ".repeat(info_right));
    println!("{}", v.to_string().bright_black());

    print!("{}", bl.to_string().bright_black());
    print!("{}", h.to_string().repeat(content_width).bright_black());
    println!("{}", br.to_string().bright_black());

    println!(
        "  {} for help, {} to leave, {} twice to complete paths",
        "help".green(),
        "exit".green(),
        "Tab".yellow()
    );
    println!();
}
