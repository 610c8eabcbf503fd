use rustyline::completion::Completer;
use rustyline::completion::Pair;
use rustyline::highlight::Highlighter;
use rustyline::hint::Hinter;
use rustyline::validate::Validator;
use rustyline::Context;
use rustyline::Helper;
use rustyline::Result;

use super::commands::command_words;

pub struct CliHelper {
    words: Vec<&'static str>,
}

impl Default for CliHelper {
    fn default() -> Self {
        Self {
            words: command_words(),
        }
    }
}

// The accompanying helper for BasegridCli.
// Completes the first word of a line against the known commands.
impl CliHelper {
    fn candidates(&self, line: &str, pos: usize) -> (usize, Vec<Pair>) {
        let typed = &line[..pos];
        if typed.contains(char::is_whitespace) {
            return (pos, vec![]);
        }

        let pairs = self
            .words
            .iter()
            .filter(|w| w.starts_with(typed))
            .map(|w| Pair {
                display: w.to_string(),
                replacement: w.to_string(),
            })
            .collect();
        (0, pairs)
    }
}

impl Highlighter for CliHelper {}

impl Hinter for CliHelper {
    type Hint = String;
}

impl Completer for CliHelper {
    type Candidate = Pair;

    fn complete(&self, line: &str, pos: usize, _ctx: &Context<'_>) -> Result<(usize, Vec<Pair>)> {
        Ok(self.candidates(line, pos))
    }
}

impl Validator for CliHelper {}

impl Helper for CliHelper {}
