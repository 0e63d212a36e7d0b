// src/commands/prompt.rs
//! Interactive yes/no questions

use std::io::{self, BufRead, Write};

/// Ask a yes/no question on the terminal
///
/// An empty answer (or end of input) picks `default_yes`. Anything starting
/// with `y` or `Y` is yes, everything else no.
pub fn ask_yes_no(question: &str, default_yes: bool) -> io::Result<bool> {
    let stdin = io::stdin();
    let stdout = io::stdout();
    ask_yes_no_with(&mut stdin.lock(), &mut stdout.lock(), question, default_yes)
}

pub fn ask_yes_no_with<R: BufRead, W: Write>(
    input: &mut R,
    output: &mut W,
    question: &str,
    default_yes: bool,
) -> io::Result<bool> {
    let suffix = if default_yes { "(Yes/n)" } else { "(y/No)" };
    write!(output, "{} {} ", question, suffix)?;
    output.flush()?;

    let mut line = String::new();
    input.read_line(&mut line)?;
    let answer = line.trim();

    if answer.is_empty() {
        return Ok(default_yes);
    }
    Ok(answer.starts_with(['y', 'Y']))
}
