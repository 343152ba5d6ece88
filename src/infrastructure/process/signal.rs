//! Signal delivery to spawned processes.

use nix::errno::Errno;
use nix::sys::signal::{kill, killpg, Signal};
use nix::unistd::Pid;
use tracing::debug;

use crate::domain::errors::{RunError, RunResult};

fn to_pid(pid: u32) -> RunResult<Pid> {
    i32::try_from(pid)
        .map(Pid::from_raw)
        .map_err(|_| RunError::Signal {
            pid,
            reason: "pid out of range".to_string(),
        })
}

/// Send `signal` to `pid`, or to the process group it leads.
///
/// Returns `false` when nothing was there to receive it.
pub fn send(pid: u32, signal: Signal, whole_group: bool) -> RunResult<bool> {
    let target = to_pid(pid)?;
    let result = if whole_group {
        killpg(target, signal)
    } else {
        kill(target, signal)
    };

    match result {
        Ok(()) => {
            debug!(pid, ?signal, whole_group, "signal delivered");
            Ok(true)
        }
        Err(Errno::ESRCH) => {
            debug!(pid, ?signal, "no such process");
            Ok(false)
        }
        Err(errno) => Err(RunError::Signal {
            pid,
            reason: errno.desc().to_string(),
        }),
    }
}
