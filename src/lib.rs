//! Parsing and process execution for a small command language: `;`, `&`,
//! `&&`, `||`, `|`, `( ... )`, `<`, `>`, `>>`, quoting and comments.
//!
//! ```no_run
//! use pipesh::{parse, Executor, Outcome};
//!
//! let parsed = parse("echo hi > greeting.txt && cat < greeting.txt").unwrap();
//! let mut executor = Executor::default();
//! assert_eq!(executor.execute(&parsed.list).unwrap(), Outcome::Status(0));
//! ```

pub mod shell;
pub mod utils;

pub use shell::error::{ExecError, ParseError};
pub use shell::executor::{Executor, Outcome};
pub use shell::job_manager::{Job, JobManager};
pub use shell::parser::{parse, CommandList, Parsed};
