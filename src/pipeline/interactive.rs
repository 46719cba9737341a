//! Operator-driven repair loop as an explicit state machine.

use tracing::info;

use super::{CheckOutcome, CheckState, Orchestrator};
use crate::affected::AffectedRows;
use crate::checks::Check;
use crate::AppResult;

const PROMPT: &str = "Action? [e]xecute, [s]imulate, [a]bort, [r]eload, [p]ages, [d]etails, [h]elp: ";

const HELP: [&str; 7] = [
    "  e  re-detect and repair the affected rows",
    "  s  re-detect and show the statements a repair would run",
    "  a  abort this check and stop the run",
    "  r  reload: re-detect affected rows without repairing",
    "  p  show affected pages with their rootline",
    "  d  show affected rows in detail",
    "  h  show this help",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Execute,
    Simulate,
    Abort,
    Reload,
    Pages,
    Details,
    Help,
}

impl Command {
    /// First character decides; anything unrecognised is `Help`.
    pub fn parse(input: &str) -> Command {
        match input.trim().chars().next().map(|c| c.to_ascii_lowercase()) {
            Some('e') => Command::Execute,
            Some('s') => Command::Simulate,
            Some('a') => Command::Abort,
            Some('r') => Command::Reload,
            Some('p') => Command::Pages,
            Some('d') => Command::Details,
            _ => Command::Help,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InteractiveState {
    Scanning,
    Prompting,
    Executing,
    Aborted,
    Done,
}

impl<'a> Orchestrator<'a> {
    /// Loops until the operator aborts or a detection after a repair comes
    /// back empty.
    ///
    /// A reload that finds nothing keeps prompting. Closed input counts as an
    /// abort.
    pub(super) fn interact(
        &mut self,
        check: &dyn Check,
        initial: AffectedRows,
        outcome: &mut CheckOutcome,
    ) -> AppResult<CheckState> {
        let ctx = self.context();
        let mut affected = initial;
        let mut repaired = false;
        let mut state = if affected.is_empty() {
            self.console.line("  => OK");
            InteractiveState::Done
        } else {
            self.console.line(&format!("  {}", check.description()));
            self.show_result(&affected);
            InteractiveState::Prompting
        };

        loop {
            state = match state {
                InteractiveState::Scanning => {
                    affected = check.detect(&ctx)?;
                    outcome.remaining = affected.counts();
                    self.show_result(&affected);
                    if affected.is_empty() && repaired {
                        InteractiveState::Done
                    } else {
                        InteractiveState::Prompting
                    }
                }
                InteractiveState::Prompting => match self.console.read_command(PROMPT)? {
                    None => {
                        self.console.warning("input closed; aborting");
                        InteractiveState::Aborted
                    }
                    Some(input) => match Command::parse(&input) {
                        Command::Execute => InteractiveState::Executing,
                        Command::Simulate => {
                            affected = check.detect(&ctx)?;
                            self.repair(check, &affected, true)?;
                            InteractiveState::Prompting
                        }
                        Command::Abort => InteractiveState::Aborted,
                        Command::Reload => InteractiveState::Scanning,
                        Command::Pages => {
                            self.show_pages(&affected)?;
                            InteractiveState::Prompting
                        }
                        Command::Details => {
                            self.show_details(&affected);
                            InteractiveState::Prompting
                        }
                        Command::Help => {
                            for line in HELP {
                                self.console.line(line);
                            }
                            InteractiveState::Prompting
                        }
                    },
                },
                InteractiveState::Executing => {
                    affected = check.detect(&ctx)?;
                    let report = self.repair(check, &affected, false)?;
                    outcome.rows_changed += report.rows_changed;
                    repaired = true;
                    info!(target: "dbmend", check = check.id(), rows = report.rows_changed, "repaired");
                    InteractiveState::Scanning
                }
                InteractiveState::Aborted => return Ok(CheckState::Aborted),
                InteractiveState::Done => return Ok(CheckState::Ok),
            };
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn commands_parse_by_first_character() {
        assert_eq!(Command::parse("e"), Command::Execute);
        assert_eq!(Command::parse("  Simulate"), Command::Simulate);
        assert_eq!(Command::parse("a\n"), Command::Abort);
        assert_eq!(Command::parse("r"), Command::Reload);
        assert_eq!(Command::parse("p"), Command::Pages);
        assert_eq!(Command::parse("D"), Command::Details);
        assert_eq!(Command::parse(""), Command::Help);
        assert_eq!(Command::parse("x"), Command::Help);
    }
}
