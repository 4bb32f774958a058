use log::{debug, error};
use nix::sys::signal::{signal, SigHandler, Signal};

/// The interpreter itself never dies on Ctrl-C; the foreground child does.
pub fn ignore_interrupt() {
    set_disposition(Signal::SIGINT, SigHandler::SigIgn);
    debug!("SIGINT ignored by the interpreter");
}

/// Reset, in a freshly forked child, every disposition the interpreter
/// ignores. An ignored disposition survives the exec, and the Rust runtime
/// ignores SIGPIPE before `main`, so a writer whose reader is gone would
/// otherwise see EPIPE instead of dying.
pub fn restore_child_defaults() {
    set_disposition(Signal::SIGINT, SigHandler::SigDfl);
    set_disposition(Signal::SIGPIPE, SigHandler::SigDfl);
}

fn set_disposition(sig: Signal, handler: SigHandler) {
    // SAFETY: installs one of the kernel dispositions, no Rust handler runs.
    if let Err(e) = unsafe { signal(sig, handler) } {
        error!("cannot set {} disposition: {}", sig, e);
    }
}
