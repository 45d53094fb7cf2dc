//! Signal handling for gshell
//!
//! Handlers set atomic flags and nothing else; the REPL and the line
//! editor drain them at loop boundaries. `SIGCHLD` is answered with a
//! `waitpid(-1, WNOHANG)` sweep that marks finished background jobs.
//! Handlers are registered with `SA_RESTART` so long reads resume.

use std::io::Write;
use std::sync::atomic::{AtomicBool, Ordering};

use nix::sys::signal::{kill, Signal};
use nix::sys::wait::{waitpid, WaitPidFlag, WaitStatus};
use nix::unistd::Pid;

use crate::state::ShellState;

/// Set when SIGINT arrives (Ctrl-C).
pub static SIGINT_RECEIVED: AtomicBool = AtomicBool::new(false);

/// Set when SIGTSTP arrives (Ctrl-Z).
pub static SIGTSTP_RECEIVED: AtomicBool = AtomicBool::new(false);

/// Set when SIGCHLD arrives; a child needs reaping.
pub static SIGCHLD_RECEIVED: AtomicBool = AtomicBool::new(false);

/// Install the shell's signal handlers. SIGQUIT is ignored for the
/// lifetime of the REPL.
pub fn install() {
    use signal_hook::low_level;

    unsafe {
        let _ = low_level::register(signal_hook::consts::SIGINT, || {
            SIGINT_RECEIVED.store(true, Ordering::SeqCst);
        });
        let _ = low_level::register(signal_hook::consts::SIGTSTP, || {
            SIGTSTP_RECEIVED.store(true, Ordering::SeqCst);
        });
        let _ = low_level::register(signal_hook::consts::SIGCHLD, || {
            SIGCHLD_RECEIVED.store(true, Ordering::SeqCst);
        });
        libc::signal(libc::SIGQUIT, libc::SIG_IGN);
    }
}

/// Check-and-clear the SIGINT flag.
pub fn take_sigint() -> bool {
    SIGINT_RECEIVED.swap(false, Ordering::SeqCst)
}

/// Check-and-clear the SIGTSTP flag.
pub fn take_sigtstp() -> bool {
    SIGTSTP_RECEIVED.swap(false, Ordering::SeqCst)
}

/// Check-and-clear the SIGCHLD flag.
pub fn take_sigchld() -> bool {
    SIGCHLD_RECEIVED.swap(false, Ordering::SeqCst)
}

/// Drain finished children without blocking and mark their jobs done.
/// Safe to call even when no SIGCHLD is pending.
pub fn reap_children(state: &mut ShellState) {
    loop {
        match waitpid(Pid::from_raw(-1), Some(WaitPidFlag::WNOHANG)) {
            Ok(WaitStatus::Exited(pid, _)) | Ok(WaitStatus::Signaled(pid, _, _)) => {
                state.mark_job_done(pid.as_raw());
            }
            Ok(_) => break,
            Err(_) => break, // ECHILD: nothing left to reap
        }
    }
}

/// Report jobs that completed since the last prompt, then drop them.
pub fn report_done_jobs(state: &mut ShellState, out: &mut impl Write) {
    let mut any = false;
    for job in state.jobs() {
        if job.status == crate::state::JobStatus::Done {
            let _ = writeln!(out, "[{}] done  {}", job.id, job.command);
            any = true;
        }
    }
    if any {
        state.reap_done_jobs();
    }
}

/// Send SIGCONT to a process (used by `fg`/`bg`).
pub fn continue_process(pid: i32) -> Result<(), String> {
    kill(Pid::from_raw(pid), Signal::SIGCONT)
        .map_err(|e| format!("failed to continue process {}: {}", pid, e))
}

/// Block until `pid` exits; returns its exit code or `128 + signo`.
pub fn wait_for(pid: i32) -> i32 {
    match waitpid(Pid::from_raw(pid), None) {
        Ok(WaitStatus::Exited(_, code)) => code,
        Ok(WaitStatus::Signaled(_, sig, _)) => 128 + sig as i32,
        _ => 0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flags_swap_to_false() {
        SIGINT_RECEIVED.store(true, Ordering::SeqCst);
        assert!(take_sigint());
        assert!(!take_sigint());
    }

    #[test]
    fn reap_with_no_children_is_quiet() {
        let mut state = ShellState::default();
        reap_children(&mut state);
        assert!(state.jobs().is_empty());
    }
}
