use std::ffi::{CString, NulError};
use std::os::fd::OwnedFd;

use log::{debug, info};
use nix::unistd::{fork, pipe, ForkResult, Pid};

use super::builtin::run_builtin;
use super::process::{c_argv, exec_program, flush_std_streams, wait_for, StageIo};
use super::{Outcome, FAILURE, NOT_FOUND, SUCCESS};
use crate::shell::error::{report, ExecError};
use crate::shell::job_manager::JobManager;
use crate::shell::parser::{Command, CommandList, Link, ListEntry};
use crate::shell::signals;

/// One started pipeline stage.
#[derive(Debug)]
enum Launched {
    Process(Pid),
    Builtin(Outcome),
}

impl Launched {
    fn pid(&self) -> Option<Pid> {
        match self {
            Launched::Process(pid) => Some(*pid),
            Launched::Builtin(_) => None,
        }
    }
}

/// Walks command trees and maps them onto processes.
pub struct Executor {
    jobs: JobManager,
}

impl Executor {
    pub fn new(jobs: JobManager) -> Self {
        Self { jobs }
    }

    pub fn jobs(&self) -> &JobManager {
        &self.jobs
    }

    pub fn jobs_mut(&mut self) -> &mut JobManager {
        &mut self.jobs
    }

    /// Run every entry of `list` in order, honouring `&&` and `||`.
    ///
    /// Returns the status of the last entry that ran, or `Outcome::Exit` as
    /// soon as the `exit` built-in runs. A pipe or fork failure abandons the
    /// rest of the list.
    pub fn execute(&mut self, list: &CommandList) -> Result<Outcome, ExecError> {
        let mut status = SUCCESS;
        let mut skip = false;

        for entry in &list.entries {
            if skip {
                debug!("skipped: {}", entry.pipeline);
            } else {
                match self.execute_entry(entry)? {
                    Outcome::Exit => return Ok(Outcome::Exit),
                    Outcome::Status(code) => status = code,
                }
            }

            // a skipped entry passes the last real status on to its own link
            skip = match entry.link {
                Link::And => status != SUCCESS,
                Link::Or => status == SUCCESS,
                Link::Sequential | Link::Background => false,
            };
        }

        Ok(Outcome::Status(status))
    }

    fn execute_entry(&mut self, entry: &ListEntry) -> Result<Outcome, ExecError> {
        let stages = &entry.pipeline.stages;
        let mut launched = Vec::with_capacity(stages.len());

        if let Err(e) = self.launch(stages, None, &mut launched) {
            // their pipe ends are closed by now, so they finish on their own
            for pid in launched.iter().filter_map(Launched::pid) {
                wait_for(pid);
            }
            return Err(e);
        }

        let exit = launched
            .iter()
            .any(|stage| matches!(stage, Launched::Builtin(Outcome::Exit)));

        if entry.is_background() {
            let pids: Vec<Pid> = launched.iter().filter_map(Launched::pid).collect();
            if let Some((&leader, followers)) = pids.split_first() {
                let job = self
                    .jobs
                    .add_job(leader, followers.to_vec(), entry.pipeline.to_string());
                info!("background job {}", job);
            }
            return Ok(if exit {
                Outcome::Exit
            } else {
                Outcome::Status(SUCCESS)
            });
        }

        let mut status = SUCCESS;
        for (i, stage) in launched.iter().enumerate() {
            let code = match stage {
                Launched::Process(pid) => wait_for(*pid),
                Launched::Builtin(Outcome::Status(code)) => *code,
                Launched::Builtin(Outcome::Exit) => SUCCESS,
            };
            if i == 0 {
                status = code;
            }
        }
        debug!("`{}` finished with status {}", entry.pipeline, status);

        Ok(if exit {
            Outcome::Exit
        } else {
            Outcome::Status(status)
        })
    }

    /// Start `stages[0]` reading from `upstream`, then recurse on the rest of
    /// the pipeline with the read end of a fresh pipe as their upstream.
    /// The interpreter drops every pipe end right after the stage using it
    /// has been forked.
    fn launch(
        &mut self,
        stages: &[Command],
        upstream: Option<OwnedFd>,
        launched: &mut Vec<Launched>,
    ) -> Result<(), ExecError> {
        let Some((command, rest)) = stages.split_first() else {
            return Ok(());
        };

        let (read_end, write_end) = if rest.is_empty() {
            (None, None)
        } else {
            let (read_end, write_end) = pipe().map_err(ExecError::Pipe)?;
            (Some(read_end), Some(write_end))
        };

        if let Command::Simple(simple) = command {
            if let Some(outcome) = run_builtin(simple) {
                launched.push(Launched::Builtin(outcome));
                drop(upstream);
                drop(write_end);
                return self.launch(rest, read_end, launched);
            }
        }

        let io = StageIo::plan(command, upstream, write_end);
        let argv = match command {
            Command::Simple(simple) => Some(c_argv(simple)),
            Command::Group(_) => None,
        };
        flush_std_streams();

        // SAFETY: the child only rearranges descriptors before exec, or runs
        // the group and leaves through `_exit`.
        match unsafe { fork() }.map_err(ExecError::Fork)? {
            ForkResult::Child => {
                drop(read_end);
                signals::restore_child_defaults();
                let code = self.run_child(command, io, argv);
                flush_std_streams();
                // SAFETY: ends the child without running the parent's exit handlers.
                unsafe { libc::_exit(code) }
            }
            ForkResult::Parent { child } => {
                debug!("forked {} for `{}`", child, command);
                drop(io);
                launched.push(Launched::Process(child));
                self.launch(rest, read_end, launched)
            }
        }
    }

    fn run_child(
        &mut self,
        command: &Command,
        io: StageIo,
        argv: Option<Result<Vec<CString>, NulError>>,
    ) -> i32 {
        if let Err(e) = io.apply() {
            report(format!("cannot redirect: {}", e));
            return FAILURE;
        }

        match (command, argv) {
            (Command::Group(list), _) => match self.execute(list) {
                Ok(Outcome::Status(code)) => code,
                Ok(Outcome::Exit) => SUCCESS,
                Err(e) => {
                    report(&e);
                    FAILURE
                }
            },
            (Command::Simple(_), Some(Ok(argv))) => exec_program(&argv),
            (Command::Simple(simple), _) => {
                report(format!("{}: argument contains a NUL byte", simple.program()));
                NOT_FOUND
            }
        }
    }
}

impl Default for Executor {
    fn default() -> Self {
        Self::new(JobManager::new())
    }
}
