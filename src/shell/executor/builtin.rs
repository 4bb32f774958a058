use std::env;

use log::debug;

use super::{Outcome, FAILURE, SUCCESS};
use crate::shell::error::report;
use crate::shell::parser::SimpleCommand;

/// Run `command` in the interpreter process if it names a built-in.
/// Returns `None` for anything that needs a child process.
pub fn run_builtin(command: &SimpleCommand) -> Option<Outcome> {
    let outcome = match command.program() {
        "cd" => Outcome::Status(builtin_cd(command.arguments())),
        "exit" => Outcome::Exit,
        _ => return None,
    };
    debug!("builtin: {} -> {:?}", command, outcome);
    Some(outcome)
}

fn builtin_cd(arguments: &[String]) -> i32 {
    let target = match arguments {
        [] => "~",
        [path] => path.as_str(),
        _ => {
            report("cd: too many arguments");
            return FAILURE;
        }
    };

    let path = shellexpand::tilde(target);
    match env::set_current_dir(path.as_ref()) {
        Ok(()) => SUCCESS,
        Err(e) => {
            report(format!("cd: {}: {}", target, e));
            FAILURE
        }
    }
}
