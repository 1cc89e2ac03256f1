use std::io;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// Process-local cancellation token.
///
/// Signal handlers only set the flag; every blocking wait re-checks it when
/// interrupted, so cancellation is observed at well-defined points rather
/// than inside signal-handler-safe code paths.
#[derive(Debug, Clone, Default)]
pub struct ShutdownToken {
    flag: Arc<AtomicBool>,
}

impl ShutdownToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Routes SIGINT and SIGTERM into this token. `sem_wait` is never
    /// auto-restarted after a signal, so a registered signal surfaces as an
    /// interrupted wait and the flag is seen promptly.
    pub fn register_signals(&self) -> io::Result<()> {
        use signal_hook::consts::{SIGINT, SIGTERM};
        use signal_hook::flag;
        flag::register(SIGINT, self.flag.clone())?;
        flag::register(SIGTERM, self.flag.clone())?;
        Ok(())
    }

    pub fn set(&self) {
        self.flag.store(true, Ordering::Relaxed);
    }

    #[inline]
    pub fn is_set(&self) -> bool {
        self.flag.load(Ordering::Relaxed)
    }
}
