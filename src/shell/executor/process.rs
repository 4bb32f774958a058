use std::ffi::{CString, NulError};
use std::fs::OpenOptions;
use std::io::{self, Write};
use std::os::fd::{AsRawFd, IntoRawFd, OwnedFd, RawFd};
use std::os::unix::fs::OpenOptionsExt;

use log::error;
use nix::errno::Errno;
use nix::sys::wait::{waitpid, WaitStatus};
use nix::unistd::{dup2, execvp, Pid};

use super::{FAILURE, NOT_FOUND};
use crate::shell::error::report;
use crate::shell::parser::{Command, SimpleCommand};

/// Where a forked stage reads from and writes to. `None` keeps the
/// descriptor inherited from the interpreter.
#[derive(Debug, Default)]
pub struct StageIo {
    pub stdin: Option<OwnedFd>,
    pub stdout: Option<OwnedFd>,
}

impl StageIo {
    /// Combine the pipe ends around a stage with its file redirections.
    /// A pipe end always wins over a file; the file is then not opened.
    /// A file that cannot be opened is reported and left out.
    pub fn plan(command: &Command, upstream: Option<OwnedFd>, downstream: Option<OwnedFd>) -> Self {
        let Command::Simple(simple) = command else {
            return Self {
                stdin: upstream,
                stdout: downstream,
            };
        };

        let stdin = match (upstream, &simple.input_file) {
            (Some(fd), Some(path)) => {
                report(format!(
                    "{}: input file {} ignored, input comes from a pipe",
                    simple.program(),
                    path
                ));
                Some(fd)
            }
            (Some(fd), None) => Some(fd),
            (None, Some(path)) => open_input(path),
            (None, None) => None,
        };

        let stdout = match (downstream, &simple.output_file) {
            (Some(fd), Some(path)) => {
                report(format!(
                    "{}: output file {} ignored, output goes to a pipe",
                    simple.program(),
                    path
                ));
                Some(fd)
            }
            (Some(fd), None) => Some(fd),
            (None, Some(path)) => open_output(path, simple.append),
            (None, None) => None,
        };

        Self { stdin, stdout }
    }

    /// Move the planned descriptors onto 0 and 1 and close the originals.
    /// Only meant for the child side of a fork.
    pub fn apply(self) -> nix::Result<()> {
        if let Some(fd) = self.stdin {
            redirect(fd, libc::STDIN_FILENO)?;
        }
        if let Some(fd) = self.stdout {
            redirect(fd, libc::STDOUT_FILENO)?;
        }
        Ok(())
    }
}

fn open_input(path: &str) -> Option<OwnedFd> {
    match OpenOptions::new().read(true).open(path) {
        Ok(file) => Some(OwnedFd::from(file)),
        Err(e) => {
            report(format!("cannot open {}: {}", path, e));
            None
        }
    }
}

fn open_output(path: &str, append: bool) -> Option<OwnedFd> {
    let opened = OpenOptions::new()
        .write(true)
        .create(true)
        .append(append)
        .truncate(!append)
        .mode(0o666)
        .open(path);
    match opened {
        Ok(file) => Some(OwnedFd::from(file)),
        Err(e) => {
            report(format!("cannot open {}: {}", path, e));
            None
        }
    }
}

fn redirect(fd: OwnedFd, target: RawFd) -> nix::Result<()> {
    if fd.as_raw_fd() == target {
        // already in place; keep it open
        let _ = fd.into_raw_fd();
        return Ok(());
    }
    dup2(fd.as_raw_fd(), target)?;
    Ok(())
}

/// Build the C argument vector ahead of the fork.
pub fn c_argv(command: &SimpleCommand) -> Result<Vec<CString>, NulError> {
    command
        .argv
        .iter()
        .map(|arg| CString::new(arg.as_bytes()))
        .collect()
}

/// Replace the current process image. Only returns if that failed, with the
/// status the child should exit with.
pub fn exec_program(argv: &[CString]) -> i32 {
    let Some(program) = argv.first() else {
        return FAILURE;
    };

    if let Err(e) = execvp(program, argv) {
        let name = program.to_string_lossy();
        match e {
            Errno::ENOENT => report(format!("{}: unknown command", name)),
            e => report(format!("{}: {}", name, e)),
        }
    }
    NOT_FOUND
}

/// Block until `pid` terminates. A signal death counts as `128 + signal`.
pub fn wait_for(pid: Pid) -> i32 {
    loop {
        match waitpid(pid, None) {
            Ok(WaitStatus::Exited(_, code)) => return code,
            Ok(WaitStatus::Signaled(_, signal, _)) => return 128 + signal as i32,
            Ok(_) | Err(Errno::EINTR) => continue,
            Err(e) => {
                error!("waitpid({}) failed: {}", pid, e);
                return FAILURE;
            }
        }
    }
}

/// Push out anything buffered so a forked child does not print it twice.
pub fn flush_std_streams() {
    let _ = io::stdout().flush();
    let _ = io::stderr().flush();
}
