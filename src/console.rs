//! Terminal boundary: everything the pipeline prints or reads goes through
//! [`Console`], so the interactive loop runs the same against a script.

use std::collections::VecDeque;
use std::io::{self, BufRead, Write};

use crate::{AppError, AppResult};

pub trait Console {
    fn line(&mut self, text: &str);

    fn warning(&mut self, text: &str) {
        self.line(&format!("WARNING: {text}"));
    }

    /// A generated SQL statement, simulated or executed.
    fn statement(&mut self, sql: &str) {
        self.line(&format!("  {sql}"));
    }

    /// Reads one command line; `Ok(None)` means input is exhausted.
    fn read_command(&mut self, prompt: &str) -> AppResult<Option<String>>;
}

/// Stdout/stdin console used by the binary.
pub struct TerminalConsole {
    stdin: io::Stdin,
}

impl TerminalConsole {
    pub fn new() -> Self {
        Self { stdin: io::stdin() }
    }
}

impl Default for TerminalConsole {
    fn default() -> Self {
        Self::new()
    }
}

impl Console for TerminalConsole {
    fn line(&mut self, text: &str) {
        println!("{text}");
    }

    fn warning(&mut self, text: &str) {
        eprintln!("WARNING: {text}");
    }

    fn read_command(&mut self, prompt: &str) -> AppResult<Option<String>> {
        print!("{prompt}");
        io::stdout()
            .flush()
            .map_err(|err| AppError::from(err).with_context("operation", "flush_prompt"))?;
        let mut buffer = String::new();
        let read = self
            .stdin
            .lock()
            .read_line(&mut buffer)
            .map_err(|err| AppError::from(err).with_context("operation", "read_command"))?;
        if read == 0 {
            return Ok(None);
        }
        Ok(Some(buffer.trim().to_string()))
    }
}

/// Console fed from a fixed list of commands that records all output.
#[derive(Debug, Default)]
pub struct ScriptedConsole {
    input: VecDeque<String>,
    output: Vec<String>,
    prompts: usize,
}

impl ScriptedConsole {
    pub fn new<I, S>(commands: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            input: commands.into_iter().map(Into::into).collect(),
            output: Vec::new(),
            prompts: 0,
        }
    }

    pub fn output(&self) -> &[String] {
        &self.output
    }

    pub fn prompts(&self) -> usize {
        self.prompts
    }

    pub fn contains(&self, needle: &str) -> bool {
        self.output.iter().any(|line| line.contains(needle))
    }
}

impl Console for ScriptedConsole {
    fn line(&mut self, text: &str) {
        self.output.push(text.to_string());
    }

    fn read_command(&mut self, prompt: &str) -> AppResult<Option<String>> {
        self.prompts += 1;
        self.output.push(prompt.to_string());
        Ok(self.input.pop_front())
    }
}

/// Formats rows into left-aligned columns with a header rule.
pub fn render_table(headers: &[String], rows: &[Vec<String>]) -> Vec<String> {
    let mut widths: Vec<usize> = headers.iter().map(|h| h.chars().count()).collect();
    for row in rows {
        for (idx, cell) in row.iter().enumerate() {
            if idx < widths.len() {
                widths[idx] = widths[idx].max(cell.chars().count());
            }
        }
    }
    let format_row = |cells: &[String]| -> String {
        let parts: Vec<String> = cells
            .iter()
            .enumerate()
            .map(|(idx, cell)| {
                let width = widths.get(idx).copied().unwrap_or(0);
                format!("{cell:<width$}")
            })
            .collect();
        parts.join(" | ").trim_end().to_string()
    };
    let mut out = Vec::with_capacity(rows.len() + 2);
    out.push(format_row(headers));
    out.push(
        widths
            .iter()
            .map(|w| "-".repeat(*w))
            .collect::<Vec<_>>()
            .join("-+-"),
    );
    for row in rows {
        out.push(format_row(row));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scripted_console_replays_commands_then_reports_eof() {
        let mut console = ScriptedConsole::new(["s", "a"]);
        assert_eq!(console.read_command("> ").unwrap().as_deref(), Some("s"));
        assert_eq!(console.read_command("> ").unwrap().as_deref(), Some("a"));
        assert_eq!(console.read_command("> ").unwrap(), None);
        assert_eq!(console.prompts(), 3);
    }

    #[test]
    fn table_columns_are_aligned() {
        let lines = render_table(
            &["uid".to_string(), "title".to_string()],
            &[
                vec!["1".to_string(), "Home".to_string()],
                vec!["120".to_string(), "About us".to_string()],
            ],
        );
        assert_eq!(lines[0], "uid | title");
        assert_eq!(lines[1], "----+---------");
        assert_eq!(lines[2], "1   | Home");
        assert_eq!(lines[3], "120 | About us");
    }
}
