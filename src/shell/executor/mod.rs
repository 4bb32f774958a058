mod builtin;
#[allow(clippy::module_inception)]
mod executor;
mod process;

pub use executor::Executor;

pub const SUCCESS: i32 = 0;
pub const FAILURE: i32 = 1;
/// Exit status of a child whose program could not be started.
pub const NOT_FOUND: i32 = 127;

/// What running a list amounted to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// Status of the last entry that ran; 0 is success.
    Status(i32),
    /// The `exit` built-in ran.
    Exit,
}

impl Outcome {
    pub fn success(&self) -> bool {
        matches!(self, Outcome::Status(SUCCESS) | Outcome::Exit)
    }
}
