use std::{
    fs::File,
    process::{Child, Command, Stdio},
    time::{Duration, Instant},
};

use crate::error::JudgeCoreError;

use super::{ExitKind, RunOutcome, RunRequest, Runner};

/// Address space allowed beyond twice the memory limit, covers the loader
/// and shared libraries
#[cfg(unix)]
const ADDRESS_SPACE_HEADROOM: u64 = 64 * 1024 * 1024;

#[cfg(unix)]
#[derive(Default, Debug, Clone, Copy)]
struct RlimitConfigs {
    as_limit: Option<(u64, u64)>,
    cpu_limit: Option<(u64, u64)>,
}

#[cfg(unix)]
impl RlimitConfigs {
    fn for_request(request: &RunRequest) -> Self {
        // CPU limit is only a backstop, the wall clock timeout decides TLE
        let cpu_secs = request.time_limit.as_secs() + 1;
        let as_limit = request.memory_limit_bytes.map(|bytes| {
            let cap = bytes
                .saturating_mul(2)
                .saturating_add(ADDRESS_SPACE_HEADROOM);
            (cap, cap)
        });
        Self {
            as_limit,
            cpu_limit: Some((cpu_secs, cpu_secs + 1)),
        }
    }

    // Runs in the forked child, no logging or allocation here
    fn load(&self) -> Result<(), nix::errno::Errno> {
        use nix::sys::resource::{
            setrlimit,
            Resource::{RLIMIT_AS, RLIMIT_CPU},
        };
        if let Some(as_limit) = self.as_limit {
            setrlimit(RLIMIT_AS, as_limit.0, as_limit.1)?;
        }
        if let Some(cpu_limit) = self.cpu_limit {
            setrlimit(RLIMIT_CPU, cpu_limit.0, cpu_limit.1)?;
        }
        Ok(())
    }
}

/// Exit status and peak resident memory of a reaped child.
#[derive(Debug, Clone, Copy)]
struct Reaped {
    exit: ExitKind,
    max_rss_bytes: Option<u64>,
}

#[cfg(unix)]
fn wait4(pid: libc::pid_t, flags: libc::c_int) -> Result<Option<Reaped>, JudgeCoreError> {
    let mut status: libc::c_int = 0;
    // Safety: rusage is plain old data, all zero is a valid value
    let mut usage: libc::rusage = unsafe { std::mem::zeroed() };
    loop {
        let ret = unsafe { libc::wait4(pid, &mut status, flags, &mut usage) };
        if ret == 0 {
            return Ok(None);
        }
        if ret > 0 {
            break;
        }
        let err = std::io::Error::last_os_error();
        if err.kind() != std::io::ErrorKind::Interrupted {
            return Err(err.into());
        }
    }

    let exit = if libc::WIFEXITED(status) {
        ExitKind::Exited(libc::WEXITSTATUS(status))
    } else {
        ExitKind::Signaled
    };
    // ru_maxrss is in bytes on macOS and KiB elsewhere
    let max_rss = usage.ru_maxrss.max(0) as u64;
    let max_rss_bytes = if cfg!(target_os = "macos") {
        max_rss
    } else {
        max_rss * 1024
    };
    Ok(Some(Reaped {
        exit,
        max_rss_bytes: Some(max_rss_bytes),
    }))
}

/// Polls the child until it exits or `time_limit` passes. On timeout the
/// child is killed and reaped. The second value tells whether it timed out.
#[cfg(unix)]
fn wait_child(child: &mut Child, time_limit: Duration) -> Result<(Reaped, bool), JudgeCoreError> {
    const MAX_PAUSE: Duration = Duration::from_millis(10);

    let pid = child.id() as libc::pid_t;
    let deadline = Instant::now() + time_limit;
    let mut pause = Duration::from_millis(1);
    loop {
        if let Some(reaped) = wait4(pid, libc::WNOHANG)? {
            return Ok((reaped, false));
        }
        let now = Instant::now();
        if now >= deadline {
            break;
        }
        std::thread::sleep(pause.min(deadline - now));
        pause = (pause * 2).min(MAX_PAUSE);
    }

    log::debug!("Process {} timed out, killing", pid);
    if let Err(e) = child.kill() {
        log::warn!("Failed to kill process {}: {}", pid, e);
    }
    loop {
        if let Some(reaped) = wait4(pid, 0)? {
            return Ok((reaped, true));
        }
    }
}

#[cfg(not(unix))]
fn wait_child(child: &mut Child, time_limit: Duration) -> Result<(Reaped, bool), JudgeCoreError> {
    use wait_timeout::ChildExt;

    match child.wait_timeout(time_limit)? {
        Some(status) => {
            let exit = match status.code() {
                Some(code) => ExitKind::Exited(code),
                None => ExitKind::Signaled,
            };
            Ok((
                Reaped {
                    exit,
                    max_rss_bytes: None,
                },
                false,
            ))
        }
        None => {
            log::debug!("Process {} timed out, killing", child.id());
            if let Err(e) = child.kill() {
                log::warn!("Failed to kill process {}: {}", child.id(), e);
            }
            let status = child.wait()?;
            let exit = match status.code() {
                Some(code) => ExitKind::Exited(code),
                None => ExitKind::Signaled,
            };
            Ok((
                Reaped {
                    exit,
                    max_rss_bytes: None,
                },
                true,
            ))
        }
    }
}

/// Runs requests as plain child processes with resource limits and a wall
/// clock timeout. It does not isolate the child any further.
///
/// A run whose peak resident memory reaches the requested limit is reported
/// as `MemoryLimitExceeded`, whatever its exit status. The address space cap
/// only stops runaway allocations.
#[derive(Debug, Default, Clone, Copy)]
pub struct ProcessRunner;

impl ProcessRunner {
    pub fn new() -> Self {
        Self
    }

    fn build_command(request: &RunRequest) -> Result<Command, JudgeCoreError> {
        let mut command = Command::new(&request.program);
        command.args(&request.args).current_dir(&request.working_dir);

        command.stdin(match &request.stdin {
            Some(path) => Stdio::from(File::open(path)?),
            None => Stdio::null(),
        });
        command.stdout(match &request.stdout {
            Some(path) => Stdio::from(File::create(path)?),
            None => Stdio::null(),
        });
        command.stderr(match &request.stderr {
            Some(path) => Stdio::from(File::create(path)?),
            None => Stdio::null(),
        });

        #[cfg(unix)]
        {
            use std::os::unix::process::CommandExt;
            let limits = RlimitConfigs::for_request(request);
            unsafe {
                command.pre_exec(move || limits.load().map_err(std::io::Error::from));
            }
        }
        Ok(command)
    }
}

impl Runner for ProcessRunner {
    fn run(&self, request: &RunRequest) -> Result<RunOutcome, JudgeCoreError> {
        let mut command = Self::build_command(request)?;
        log::debug!(
            "Spawning {:?} {:?} in {:?}",
            request.program,
            request.args,
            request.working_dir
        );
        let begin_time = Instant::now();
        let mut child = command.spawn()?;
        let (reaped, timed_out) = wait_child(&mut child, request.time_limit)?;
        let time_usage = begin_time.elapsed();

        let memory_exceeded = match (reaped.max_rss_bytes, request.memory_limit_bytes) {
            (Some(used), Some(limit)) => used >= limit,
            _ => false,
        };
        let exit = if timed_out {
            ExitKind::TimedOut
        } else if memory_exceeded {
            ExitKind::MemoryLimitExceeded
        } else {
            reaped.exit
        };
        log::debug!(
            "Process finished: {:?} after {:?}, peak memory {:?} bytes",
            exit,
            time_usage,
            reaped.max_rss_bytes
        );
        Ok(RunOutcome { exit, time_usage })
    }
}
