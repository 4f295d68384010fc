//! Manual mode – drive one choreography at a time from the keyboard.
//!
//! Supported slash-commands:
//!   /organic      – run the organic sequence
//!   /non-organic  – run the non-organic sequence
//!   /b3           – run the hazardous (gate only) sequence
//!   /status       – lifecycle state, busy flag and dispatch mode
//!   /help         – show this list
//!   /quit | /exit – release the servos and exit

use colored::Colorize;
use std::io::{self, BufRead, Write};
use std::sync::atomic::{AtomicBool, Ordering};

use binsort_kernel::SortingController;
use binsort_types::WasteCategory;

/// A parsed shell command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Sort(WasteCategory),
    Status,
    Help,
    Quit,
}

impl Command {
    pub fn parse(input: &str) -> Option<Self> {
        let cmd = input.trim().strip_prefix('/')?;
        match cmd {
            "status" => Some(Command::Status),
            "help" => Some(Command::Help),
            "quit" | "exit" => Some(Command::Quit),
            label => {
                let category = WasteCategory::from_label(label);
                category.is_sortable().then_some(Command::Sort(category))
            }
        }
    }
}

/// Entry point for the manual shell.
///
/// `shutdown` is polled each iteration; when set the shell exits cleanly.
pub fn run(controller: &SortingController, shutdown: &AtomicBool) {
    let stdin = io::stdin();
    let mut stdout = io::stdout();

    loop {
        if shutdown.load(Ordering::SeqCst) {
            break;
        }

        print!("{} ", "binsort>".bold().cyan());
        stdout.flush().ok();

        let mut line = String::new();
        match stdin.lock().read_line(&mut line) {
            Ok(0) => break, // EOF
            Ok(_) => {}
            Err(e) => {
                eprintln!("{}: {}", "Read error".red(), e);
                break;
            }
        }

        let input = line.trim();
        if input.is_empty() {
            continue;
        }

        match Command::parse(input) {
            Some(Command::Sort(category)) => {
                println!("  Running {} sequence …", category.label().bold());
                let outcome = controller.try_dispatch(category);
                crate::print_outcome(&outcome);
            }
            Some(Command::Status) => cmd_status(controller),
            Some(Command::Help) => cmd_help(),
            Some(Command::Quit) => {
                println!("{}", "Goodbye.".green());
                shutdown.store(true, Ordering::SeqCst);
                break;
            }
            None => {
                println!(
                    "{} '{}'. Type {} for available commands.",
                    "Unknown command:".red(),
                    input.yellow(),
                    "/help".bold()
                );
            }
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Command handlers
// ─────────────────────────────────────────────────────────────────────────────

fn cmd_help() {
    println!();
    println!("{}", "BinSort Commands".bold().underline());
    println!("  {}      – rotate to organic, cycle the gate, return", "/organic".bold().cyan());
    println!("  {}  – rotate to non-organic, cycle the gate, return", "/non-organic".bold().cyan());
    println!("  {}           – cycle the gate over the hazardous bin", "/b3".bold().cyan());
    println!("  {}       – controller state", "/status".bold().cyan());
    println!("  {}  – release the servos and exit", "/quit  /exit".bold().cyan());
    println!();
}

fn cmd_status(controller: &SortingController) {
    println!("{}", "Controller Status".bold().underline());
    println!("  Lifecycle      : {}", format!("{:?}", controller.state()).yellow());
    let busy = if controller.is_busy() {
        "busy".yellow()
    } else {
        "idle".green()
    };
    println!("  Mechanism      : {}", busy);
    println!("  Dispatch mode  : {:?}", controller.mode());
    println!("  Min confidence : {}", controller.min_confidence());
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sort_commands_use_classifier_labels() {
        assert_eq!(Command::parse("/organic"), Some(Command::Sort(WasteCategory::Organic)));
        assert_eq!(
            Command::parse(" /non-organic "),
            Some(Command::Sort(WasteCategory::NonOrganic))
        );
        assert_eq!(Command::parse("/b3"), Some(Command::Sort(WasteCategory::Hazardous)));
    }

    #[test]
    fn control_commands() {
        assert_eq!(Command::parse("/status"), Some(Command::Status));
        assert_eq!(Command::parse("/help"), Some(Command::Help));
        assert_eq!(Command::parse("/exit"), Some(Command::Quit));
    }

    #[test]
    fn unknown_input_is_none() {
        assert_eq!(Command::parse("organic"), None);
        assert_eq!(Command::parse("/unknown"), None);
        assert_eq!(Command::parse("/"), None);
    }
}
