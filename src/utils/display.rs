//! Terminal output for the interactive session. Right-to-left content is
//! printed as-is; the terminal handles the bidi rendering.

use colored::*;
use std::io::Write;

pub fn print_header(title: &str) {
    println!("\n{}", title.bright_cyan().bold());
    println!("{}", "─".repeat(title.chars().count().max(4)).cyan());
}

pub fn print_success(text: &str) {
    println!("{} {}", "✓".green(), text);
}

pub fn print_error(text: &str) {
    eprintln!("{} {}", "✗".red().bold(), text.red());
}

/// Inline prompt, flushed so it shows before the read blocks.
pub fn print_prompt(text: &str) {
    print!("{}", text.yellow().bold());
    std::io::stdout().flush().ok();
}

pub fn print_assistant(text: &str) {
    println!("{} {}\n", "Sicha:".bright_magenta().bold(), text);
}
