use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::fmt;

use log::{debug, error};
use nix::errno::Errno;
use nix::sys::wait::{waitpid, WaitPidFlag, WaitStatus};
use nix::unistd::Pid;

/// A pipeline launched with `&`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Job {
    pub index: usize,
    /// Leading process of the pipeline; the registry key.
    pub pid: Pid,
    pub command: String,
    /// Processes of this job not yet confirmed terminated, leader first.
    pub pending: Vec<Pid>,
}

impl fmt::Display for Job {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {} {}", self.index, self.pid, self.command)
    }
}

/// Background jobs of the interpreter, keyed by leading pid.
#[derive(Debug)]
pub struct JobManager {
    jobs: HashMap<Pid, Job>,
    next_index: usize,
}

impl JobManager {
    pub fn new() -> Self {
        Self {
            jobs: HashMap::new(),
            next_index: 1,
        }
    }

    pub fn add_job(&mut self, pid: Pid, followers: Vec<Pid>, command: String) -> &Job {
        let index = self.next_index;
        self.next_index += 1;

        let mut pending = Vec::with_capacity(followers.len() + 1);
        pending.push(pid);
        pending.extend(followers);

        let job = Job {
            index,
            pid,
            command,
            pending,
        };
        debug!("job started: {}", job);
        match self.jobs.entry(pid) {
            Entry::Occupied(mut slot) => {
                slot.insert(job);
                slot.into_mut()
            }
            Entry::Vacant(slot) => slot.insert(job),
        }
    }

    pub fn remove_job(&mut self, pid: Pid) -> Option<Job> {
        self.jobs.remove(&pid)
    }

    pub fn contains(&self, pid: Pid) -> bool {
        self.jobs.contains_key(&pid)
    }

    pub fn get_job(&self, pid: Pid) -> Option<&Job> {
        self.jobs.get(&pid)
    }

    /// Jobs in the order they were started.
    pub fn jobs(&self) -> Vec<&Job> {
        let mut jobs: Vec<&Job> = self.jobs.values().collect();
        jobs.sort_by_key(|job| job.index);
        jobs
    }

    pub fn len(&self) -> usize {
        self.jobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }

    /// Poll every pending process without blocking and drop the jobs whose
    /// processes have all terminated. Returns the finished jobs in start order.
    pub fn reap(&mut self) -> Vec<Job> {
        for job in self.jobs.values_mut() {
            job.pending.retain(|&pid| !has_terminated(pid));
        }

        let finished: Vec<Pid> = self
            .jobs
            .values()
            .filter(|job| job.pending.is_empty())
            .map(|job| job.pid)
            .collect();

        let mut done: Vec<Job> = finished
            .into_iter()
            .filter_map(|pid| self.jobs.remove(&pid))
            .collect();
        done.sort_by_key(|job| job.index);
        for job in &done {
            debug!("job done: {}", job);
        }
        done
    }
}

impl Default for JobManager {
    fn default() -> Self {
        Self::new()
    }
}

fn has_terminated(pid: Pid) -> bool {
    match waitpid(pid, Some(WaitPidFlag::WNOHANG)) {
        Ok(WaitStatus::Exited(..)) | Ok(WaitStatus::Signaled(..)) => true,
        Ok(_) => false,
        // already collected elsewhere, nothing left to wait for
        Err(Errno::ECHILD) => true,
        Err(Errno::EINTR) => false,
        Err(e) => {
            error!("waitpid({}) failed: {}", pid, e);
            false
        }
    }
}
