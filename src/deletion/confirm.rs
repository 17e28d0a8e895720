// ABOUTME: Interactive confirmation before destructive work.
// ABOUTME: Terminal prompt accepting yes/y or no/n; anything else asks again.

use std::io::{BufRead, Write};

/// Asks the operator whether to proceed.
pub trait Confirm {
    fn confirm(&self, prompt: &str) -> bool;
}

/// Prompts on stderr and reads answers from stdin.
#[derive(Debug, Default, Clone, Copy)]
pub struct StdinConfirm;

impl Confirm for StdinConfirm {
    fn confirm(&self, prompt: &str) -> bool {
        let stdin = std::io::stdin();
        ask(prompt, &mut stdin.lock(), &mut std::io::stderr())
    }
}

/// Prompt loop over arbitrary streams. End of input counts as "no".
pub(crate) fn ask<R: BufRead, W: Write>(prompt: &str, input: &mut R, out: &mut W) -> bool {
    loop {
        let _ = write!(out, "{prompt} (yes/no): ");
        let _ = out.flush();

        let mut line = String::new();
        match input.read_line(&mut line) {
            Ok(0) | Err(_) => return false,
            Ok(_) => {}
        }
        match line.trim().to_lowercase().as_str() {
            "yes" | "y" => return true,
            "no" | "n" => return false,
            _ => {
                let _ = writeln!(out, "Please enter 'yes' or 'no'.");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn answer(input: &str) -> bool {
        let mut out = Vec::new();
        ask("Delete?", &mut input.as_bytes(), &mut out)
    }

    #[test]
    fn accepts_short_and_long_forms() {
        assert!(answer("y\n"));
        assert!(answer("YES\n"));
        assert!(!answer("n\n"));
        assert!(!answer("no\n"));
    }

    #[test]
    fn reprompts_until_valid() {
        let mut out = Vec::new();
        assert!(ask("Delete?", &mut "maybe\nyes\n".as_bytes(), &mut out));
        assert!(String::from_utf8(out).unwrap().contains("Please enter"));
    }

    #[test]
    fn eof_declines() {
        assert!(!answer(""));
    }
}
