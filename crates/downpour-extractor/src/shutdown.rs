//! Child-process termination with SIGTERM → SIGKILL escalation.

use std::io;

use tokio::process::Child;
use tokio::time::{timeout, Duration};

/// Grace period between the polite signal and the hard kill.
const GRACE_PERIOD: Duration = Duration::from_secs(2);

/// Terminate a child process.
///
/// Unix: SIGTERM, wait up to the grace period, then SIGKILL and reap.
/// Windows: immediate kill (no graceful equivalent).
pub async fn terminate_child(child: &mut Child) -> io::Result<()> {
    #[cfg(unix)]
    {
        use nix::sys::signal::{self, Signal};
        use nix::unistd::Pid;

        if let Some(pid) = child.id() {
            match signal::kill(Pid::from_raw(pid as i32), Signal::SIGTERM) {
                Ok(()) => {
                    if timeout(GRACE_PERIOD, child.wait()).await.is_ok() {
                        return Ok(());
                    }
                }
                Err(nix::errno::Errno::ESRCH) => {
                    // Already exited; reap below.
                }
                Err(e) => return Err(io::Error::other(e)),
            }
        }
    }

    child.kill().await?;
    child.wait().await?;
    Ok(())
}
