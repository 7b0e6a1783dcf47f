//! Interrupt registration and soft-then-hard child termination (§4.E, §5).
//!
//! Grounded on `ctrlc` (already a dependency of `foundry-rs-foundry`'s
//! `anvil` crate for its own interrupt handling) for registering a process-wide
//! interrupt handler, and on `nix`'s `sys::signal` module (present as a
//! dependency across several repos in the retrieval pack) for sending signals
//! to unix children; `windows-sys`' `Win32_System_Threading` functions cover
//! the same need on Windows, mirroring `cargo-util`'s target-specific split.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tracing::{debug, warn};

#[cfg(unix)]
use nix::sys::signal::{self, Signal};
#[cfg(unix)]
use nix::unistd::Pid;

/// Shared flag the executor checks after the build finishes to decide the
/// final exit code (`interrupted | 0x80`, per §6).
#[derive(Debug, Default, Clone)]
pub struct InterruptState {
    interrupted: Arc<AtomicBool>,
}

impl InterruptState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_interrupted(&self) -> bool {
        self.interrupted.load(Ordering::SeqCst)
    }

    pub fn mark_interrupted(&self) {
        self.interrupted.store(true, Ordering::SeqCst);
    }
}

/// Tracks every spawned child's OS pid so an interrupt can reach all of them,
/// and so the termination timer knows who is still outstanding.
#[derive(Debug, Default)]
pub struct ChildRegistry {
    pids: Mutex<Vec<u32>>,
}

impl ChildRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, pid: u32) {
        self.pids.lock().unwrap().push(pid);
    }

    pub fn unregister(&self, pid: u32) {
        self.pids.lock().unwrap().retain(|&p| p != pid);
    }

    pub fn live_pids(&self) -> Vec<u32> {
        self.pids.lock().unwrap().clone()
    }

    pub fn is_empty(&self) -> bool {
        self.pids.lock().unwrap().is_empty()
    }
}

/// Registers a process-wide `ctrlc` handler that marks `state` interrupted
/// and sends a soft signal to every registered child; a background thread
/// escalates to a hard signal after `terminate_timeout` if children are
/// still alive.
pub fn install_interrupt_handler(
    state: InterruptState,
    registry: Arc<ChildRegistry>,
    terminate_timeout: Duration,
) -> Result<(), ctrlc::Error> {
    ctrlc::set_handler(move || {
        state.mark_interrupted();
        debug!("interrupt received, signalling live children");
        send_soft_signal(&registry.live_pids());

        let registry = Arc::clone(&registry);
        let timeout = terminate_timeout;
        std::thread::spawn(move || {
            std::thread::sleep(timeout);
            if !registry.is_empty() {
                warn!(timeout_secs = timeout.as_secs(), "terminate timeout elapsed, escalating");
                send_hard_signal(&registry.live_pids());
            }
        });
    })
}

#[cfg(unix)]
fn send_soft_signal(pids: &[u32]) {
    for &pid in pids {
        let _ = signal::kill(Pid::from_raw(pid as i32), Signal::SIGINT);
    }
}

#[cfg(unix)]
fn send_hard_signal(pids: &[u32]) {
    for &pid in pids {
        let _ = signal::kill(Pid::from_raw(pid as i32), Signal::SIGTERM);
    }
}

#[cfg(windows)]
fn send_soft_signal(pids: &[u32]) {
    send_hard_signal(pids);
}

#[cfg(windows)]
fn send_hard_signal(pids: &[u32]) {
    use windows_sys::Win32::Foundation::CloseHandle;
    use windows_sys::Win32::System::Threading::{OpenProcess, TerminateProcess, PROCESS_TERMINATE};

    for &pid in pids {
        unsafe {
            let handle = OpenProcess(PROCESS_TERMINATE, 0, pid);
            if !handle.is_null() {
                TerminateProcess(handle, 1);
                CloseHandle(handle);
            }
        }
    }
}
