use std::fs;
use std::path::{Path, PathBuf};
use std::thread;
use std::time::Duration;

use nix::errno::Errno;
use nix::sys::resource::{getrlimit, setrlimit, Resource};
use nix::sys::wait::{waitpid, WaitPidFlag, WaitStatus};
use nix::unistd::{fork, ForkResult, Pid};
use pipesh::{parse, CommandList, ExecError, Executor, Outcome, ParseError};
use tempfile::TempDir;

#[allow(clippy::unwrap_used)]
fn scratch() -> TempDir {
    tempfile::tempdir().unwrap()
}

fn path(dir: &TempDir, name: &str) -> PathBuf {
    dir.path().join(name)
}

#[allow(clippy::unwrap_used)]
fn run(executor: &mut Executor, line: &str) -> Outcome {
    let parsed = parse(line).unwrap();
    assert!(parsed.bad_tail.is_none(), "unexpected tail in {line:?}");
    executor.execute(&parsed.list).unwrap()
}

fn run_line(line: &str) -> Outcome {
    run(&mut Executor::default(), line)
}

fn read(path: &Path) -> Option<String> {
    fs::read_to_string(path).ok()
}

// ── Sequencing and conditionals ──

#[test]
fn sequence_runs_everything_in_order() {
    let dir = scratch();
    let out = path(&dir, "out");
    let line = format!(
        "echo one > {o} ; false ; echo two >> {o} ; echo three >> {o}",
        o = out.display()
    );
    assert_eq!(run_line(&line), Outcome::Status(0));
    assert_eq!(read(&out).as_deref(), Some("one\ntwo\nthree\n"));
}

#[test]
fn and_runs_only_after_success() {
    let dir = scratch();
    let yes = path(&dir, "yes");
    let no = path(&dir, "no");
    run_line(&format!("true && echo ran > {}", yes.display()));
    run_line(&format!("false && echo ran > {}", no.display()));
    assert_eq!(read(&yes).as_deref(), Some("ran\n"));
    assert!(!no.exists());
}

#[test]
fn or_runs_only_after_failure() {
    let dir = scratch();
    let yes = path(&dir, "yes");
    let no = path(&dir, "no");
    run_line(&format!("false || echo ran > {}", yes.display()));
    run_line(&format!("true || echo ran > {}", no.display()));
    assert_eq!(read(&yes).as_deref(), Some("ran\n"));
    assert!(!no.exists());
}

#[test]
fn skipped_entries_pass_the_status_along() {
    let dir = scratch();
    let a = path(&dir, "a");
    let b = path(&dir, "b");
    let c = path(&dir, "c");
    let line = format!(
        "false && echo a > {} && echo b > {} || echo c > {}",
        a.display(),
        b.display(),
        c.display()
    );
    assert_eq!(run_line(&line), Outcome::Status(0));
    assert!(!a.exists());
    assert!(!b.exists());
    assert_eq!(read(&c).as_deref(), Some("c\n"));
}

#[test]
fn success_skips_or_chain_then_continues_on_and() {
    let dir = scratch();
    let skipped = path(&dir, "skipped");
    let after = path(&dir, "after");
    let line = format!(
        "true || echo x > {} && echo y > {}",
        skipped.display(),
        after.display()
    );
    run_line(&line);
    assert!(!skipped.exists());
    assert_eq!(read(&after).as_deref(), Some("y\n"));
}

#[test]
fn sequence_resets_a_skip() {
    let dir = scratch();
    let out = path(&dir, "out");
    run_line(&format!("false && echo no ; echo yes > {}", out.display()));
    assert_eq!(read(&out).as_deref(), Some("yes\n"));
}

#[test]
fn long_conditional_chain() {
    let dir = scratch();
    let out = path(&dir, "out");
    let chain = vec!["false"; 2000].join(" && ");
    let line = format!("{} || echo survived > {}", chain, out.display());
    assert_eq!(run_line(&line), Outcome::Status(0));
    assert_eq!(read(&out).as_deref(), Some("survived\n"));
}

#[test]
fn status_of_last_entry_is_returned() {
    assert_eq!(run_line("true ; false"), Outcome::Status(1));
    assert_eq!(run_line("false ; true"), Outcome::Status(0));
    assert_eq!(run_line("sh -c 'exit 7'"), Outcome::Status(7));
}

// ── Pipelines and groups ──

#[test]
fn pipe_passes_bytes_unchanged() {
    let dir = scratch();
    let source = path(&dir, "source");
    let copy = path(&dir, "copy");
    let mut data = String::new();
    for i in 0..5000 {
        data.push_str(&format!("line {i}\twith\ttabs and  spaces\n"));
    }
    fs::write(&source, &data).ok();

    let line = format!("cat {} | cat | cat > {}", source.display(), copy.display());
    assert_eq!(run_line(&line), Outcome::Status(0));
    assert_eq!(read(&copy), Some(data));
}

#[test]
fn group_output_feeds_the_pipe_in_order() {
    let dir = scratch();
    let out = path(&dir, "out");
    let line = format!("(echo a ; echo b) | cat > {}", out.display());
    assert_eq!(run_line(&line), Outcome::Status(0));
    assert_eq!(read(&out).as_deref(), Some("a\nb\n"));
}

#[test]
fn nested_groups_and_pipes() {
    let dir = scratch();
    let out = path(&dir, "out");
    let line = format!(
        "((echo x | cat) ; false || echo y) | cat | cat > {}",
        out.display()
    );
    run_line(&line);
    assert_eq!(read(&out).as_deref(), Some("x\ny\n"));
}

#[test]
fn group_status_drives_conditionals() {
    let dir = scratch();
    let out = path(&dir, "out");
    run_line(&format!("(true ; false) || echo failed > {}", out.display()));
    assert_eq!(read(&out).as_deref(), Some("failed\n"));
}

#[test]
fn exit_inside_group_only_ends_the_group() {
    let dir = scratch();
    let out = path(&dir, "out");
    let outcome = run_line(&format!("(exit ; echo no) ; echo yes > {}", out.display()));
    assert_eq!(outcome, Outcome::Status(0));
    assert_eq!(read(&out).as_deref(), Some("yes\n"));
}

#[test]
fn pipeline_status_comes_from_the_first_stage() {
    assert_eq!(run_line("false | true"), Outcome::Status(1));
    assert_eq!(run_line("true | false"), Outcome::Status(0));
}

#[test]
fn pipe_wins_over_output_file() {
    let dir = scratch();
    let ignored = path(&dir, "ignored");
    let out = path(&dir, "out");
    let line = format!("echo a > {} | cat > {}", ignored.display(), out.display());
    run_line(&line);
    assert!(!ignored.exists());
    assert_eq!(read(&out).as_deref(), Some("a\n"));
}

#[test]
fn pipe_wins_over_input_file() {
    let dir = scratch();
    let input = path(&dir, "input");
    let out = path(&dir, "out");
    fs::write(&input, "from file\n").ok();
    let line = format!(
        "echo from pipe | cat < {} > {}",
        input.display(),
        out.display()
    );
    run_line(&line);
    assert_eq!(read(&out).as_deref(), Some("from pipe\n"));
}

// ── Redirection ──

#[test]
fn output_then_input_redirection() {
    let dir = scratch();
    let f = path(&dir, "f");
    let g = path(&dir, "g");
    run_line(&format!("echo hi > {}", f.display()));
    assert_eq!(read(&f).as_deref(), Some("hi\n"));
    run_line(&format!("cat < {} > {}", f.display(), g.display()));
    assert_eq!(read(&g).as_deref(), Some("hi\n"));
}

#[test]
fn output_truncates_and_append_appends() {
    let dir = scratch();
    let f = path(&dir, "f");
    fs::write(&f, "a much longer previous content\n").ok();
    run_line(&format!("echo first > {f} ; echo second >> {f}", f = f.display()));
    assert_eq!(read(&f).as_deref(), Some("first\nsecond\n"));
}

#[test]
fn missing_input_file_is_dropped_and_execution_continues() {
    let dir = scratch();
    let missing = path(&dir, "missing");
    let out = path(&dir, "out");
    let outcome = run_line(&format!(
        "echo still runs < {} > {}",
        missing.display(),
        out.display()
    ));
    assert_eq!(outcome, Outcome::Status(0));
    assert_eq!(read(&out).as_deref(), Some("still runs\n"));
}

#[test]
fn quoted_file_names() {
    let dir = scratch();
    let out = path(&dir, "with space");
    run_line(&format!("echo quoted > '{}'", out.display()));
    assert_eq!(read(&out).as_deref(), Some("quoted\n"));
}

// ── Quoting ──

#[test]
fn quoted_argument_stays_whole() {
    let dir = scratch();
    let out = path(&dir, "out");
    run_line(&format!("printf '%s\\n' \"a b\" c > {}", out.display()));
    assert_eq!(read(&out).as_deref(), Some("a b\nc\n"));
}

#[test]
fn escaped_space_stays_in_one_argument() {
    let dir = scratch();
    let out = path(&dir, "out");
    run_line(&format!(r"printf '%s\n' a\ b c > {}", out.display()));
    assert_eq!(read(&out).as_deref(), Some("a b\nc\n"));
}

#[test]
fn operators_inside_quotes_are_text() {
    let dir = scratch();
    let out = path(&dir, "out");
    run_line(&format!("echo 'a | b && c ; (d)' > {}", out.display()));
    assert_eq!(read(&out).as_deref(), Some("a | b && c ; (d)\n"));
}

#[test]
fn newline_inside_double_quotes_reaches_the_program() {
    let dir = scratch();
    let out = path(&dir, "out");
    run_line(&format!("echo \"one\ntwo\" > {}", out.display()));
    assert_eq!(read(&out).as_deref(), Some("one\ntwo\n"));
}

#[test]
fn comment_is_ignored() {
    let dir = scratch();
    let out = path(&dir, "out");
    run_line(&format!("echo kept > {} # ; echo dropped", out.display()));
    assert_eq!(read(&out).as_deref(), Some("kept\n"));
}

// ── Errors ──

#[test]
fn unknown_program_fails_only_the_child() {
    let dir = scratch();
    let out = path(&dir, "out");
    let outcome = run_line(&format!(
        "surely-not-a-real-program-xyz || echo recovered > {}",
        out.display()
    ));
    assert_eq!(outcome, Outcome::Status(0));
    assert_eq!(read(&out).as_deref(), Some("recovered\n"));
    assert_eq!(
        run_line("surely-not-a-real-program-xyz"),
        Outcome::Status(127)
    );
}

#[test]
fn unmatched_bracket_is_reported_and_next_line_works() {
    assert_eq!(parse("(echo hi ; echo there").err(), Some(ParseError::BracketImbalance));

    let dir = scratch();
    let out = path(&dir, "out");
    assert_eq!(
        run_line(&format!("echo next > {}", out.display())),
        Outcome::Status(0)
    );
    assert_eq!(read(&out).as_deref(), Some("next\n"));
}

#[allow(clippy::unwrap_used)]
#[test]
fn bad_tail_still_runs_the_list() {
    let dir = scratch();
    let out = path(&dir, "out");
    let parsed = parse(&format!("echo ran > {} ) extra", out.display())).unwrap();
    assert!(parsed.bad_tail.is_some());
    let outcome = Executor::default().execute(&parsed.list).unwrap();
    assert_eq!(outcome, Outcome::Status(0));
    assert_eq!(read(&out).as_deref(), Some("ran\n"));
}

// ── Built-ins ──

#[test]
fn exit_stops_the_line() {
    let dir = scratch();
    let out = path(&dir, "out");
    assert_eq!(
        run_line(&format!("exit ; echo no > {}", out.display())),
        Outcome::Exit
    );
    assert!(!out.exists());
}

#[test]
fn cd_with_bad_arguments_is_recoverable() {
    let dir = scratch();
    let out = path(&dir, "out");
    run_line(&format!(
        "cd /no/such/dir/anywhere || echo cd failed > {}",
        out.display()
    ));
    assert_eq!(read(&out).as_deref(), Some("cd failed\n"));
    assert_eq!(run_line("cd a b"), Outcome::Status(1));
}

// ── Background jobs ──

#[test]
fn background_returns_immediately_and_is_reaped_later() {
    let mut executor = Executor::default();
    let started = std::time::Instant::now();
    assert_eq!(run(&mut executor, "sleep 0.5 &"), Outcome::Status(0));
    assert!(started.elapsed() < Duration::from_millis(400));

    let jobs = executor.jobs().jobs();
    assert_eq!(jobs.len(), 1);
    let pid: Pid = jobs[0].pid;
    assert_eq!(jobs[0].command, "sleep 0.5");

    assert!(executor.jobs_mut().reap().is_empty());
    assert!(executor.jobs().contains(pid));

    let mut reaped = Vec::new();
    for _ in 0..200 {
        reaped.extend(executor.jobs_mut().reap());
        if executor.jobs().is_empty() {
            break;
        }
        thread::sleep(Duration::from_millis(20));
    }
    assert_eq!(reaped.len(), 1);
    assert_eq!(reaped[0].pid, pid);
    assert!(!executor.jobs().contains(pid));
}

#[test]
fn background_entry_does_not_block_the_next_one() {
    let dir = scratch();
    let out = path(&dir, "out");
    let mut executor = Executor::default();
    let started = std::time::Instant::now();
    run(&mut executor, &format!("sleep 1 & echo next > {}", out.display()));
    assert!(started.elapsed() < Duration::from_millis(900));
    assert_eq!(read(&out).as_deref(), Some("next\n"));
    assert_eq!(executor.jobs().len(), 1);

    for _ in 0..200 {
        executor.jobs_mut().reap();
        if executor.jobs().is_empty() {
            break;
        }
        thread::sleep(Duration::from_millis(20));
    }
    assert!(executor.jobs().is_empty());
}

#[test]
fn background_pipeline_registers_every_stage() {
    let mut executor = Executor::default();
    run(&mut executor, "sleep 0.2 | sleep 0.3 &");
    let jobs = executor.jobs().jobs();
    assert_eq!(jobs.len(), 1);
    assert_eq!(jobs[0].pending.len(), 2);
    assert_eq!(jobs[0].pending[0], jobs[0].pid);

    for _ in 0..200 {
        executor.jobs_mut().reap();
        if executor.jobs().is_empty() {
            break;
        }
        thread::sleep(Duration::from_millis(20));
    }
    assert!(executor.jobs().is_empty());
}

// ── Child process state ──

fn ignored_signals(status: &str) -> Option<u64> {
    let mask = status.lines().find_map(|line| line.strip_prefix("SigIgn:"))?;
    u64::from_str_radix(mask.trim(), 16).ok()
}

#[test]
fn children_start_with_default_dispositions() {
    let dir = scratch();
    let out = path(&dir, "out");
    let line = format!("grep SigIgn /proc/self/status > {}", out.display());
    assert_eq!(run_line(&line), Outcome::Status(0));

    let mask = read(&out).as_deref().and_then(ignored_signals);
    let sigint = 1u64 << (libc::SIGINT - 1);
    let sigpipe = 1u64 << (libc::SIGPIPE - 1);
    assert_eq!(mask.map(|m| m & (sigint | sigpipe)), Some(0));
}

#[test]
fn writer_dies_once_its_reader_is_gone() {
    let dir = scratch();
    let out = path(&dir, "out");
    let err = path(&dir, "err");
    let flag = path(&dir, "flag");
    let line = format!(
        "sh -c 'yes 2> {}' | head -n 1 > {} && echo ok > {}",
        err.display(),
        out.display(),
        flag.display()
    );
    assert_eq!(run_line(&line), Outcome::Status(128 + libc::SIGPIPE));
    assert_eq!(read(&out).as_deref(), Some("y\n"));
    assert_eq!(read(&err).as_deref(), Some(""));
    assert_eq!(read(&flag), None);
}

/// Runs in a forked helper: leaves exactly two descriptors free, so the
/// first pipe fits and the second cannot be created.
fn run_out_of_descriptors(list: &CommandList) -> i32 {
    for fd in 0..3 {
        // SAFETY: probes and fills the standard slots so fd 3 is the lowest free one.
        if unsafe { libc::fcntl(fd, libc::F_GETFD) } == -1 {
            let _ = fs::File::open("/dev/null").map(std::os::fd::IntoRawFd::into_raw_fd);
        }
    }
    for fd in 3..1024 {
        // SAFETY: only this forked helper loses the descriptors.
        unsafe { libc::close(fd) };
    }
    let Ok((_, hard)) = getrlimit(Resource::RLIMIT_NOFILE) else {
        return 2;
    };
    if setrlimit(Resource::RLIMIT_NOFILE, 5, hard).is_err() {
        return 2;
    }

    let result = Executor::default().execute(list);
    if !matches!(result, Err(ExecError::Pipe(Errno::EMFILE))) {
        return 3;
    }
    // the stage launched before the failure has been waited for
    match waitpid(None::<Pid>, Some(WaitPidFlag::WNOHANG)) {
        Err(Errno::ECHILD) => 0,
        _ => 4,
    }
}

#[allow(clippy::unwrap_used)]
#[test]
fn pipe_failure_mid_pipeline_reaps_launched_stages() {
    let parsed = parse("true | true | true").unwrap();
    // SAFETY: the helper runs the executor and leaves through `_exit`.
    match unsafe { fork() }.unwrap() {
        ForkResult::Child => {
            let code = run_out_of_descriptors(&parsed.list);
            // SAFETY: skips the test harness's exit handlers.
            unsafe { libc::_exit(code) }
        }
        ForkResult::Parent { child } => {
            assert_eq!(waitpid(child, None).unwrap(), WaitStatus::Exited(child, 0));
        }
    }
}
