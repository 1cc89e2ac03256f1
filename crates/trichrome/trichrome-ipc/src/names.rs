use std::io;

/// Prefix of the POSIX object names used by a default deployment.
pub const DEFAULT_PREFIX: &str = "/trichrome";

/// Names of the four kernel-persistent IPC objects a ring instance consists
/// of: the shared-memory segment and the free/used/mutex semaphores.
///
/// All four are derived from one prefix so that independent deployments (and
/// tests running in parallel) can keep their namespaces apart while the
/// supervisor and its generators agree on a single constant.
#[derive(Debug, Clone)]
pub struct IpcNames {
    prefix: String,
}

impl IpcNames {
    /// POSIX IPC names must start with a slash and contain no further slash.
    pub fn new(prefix: impl Into<String>) -> io::Result<Self> {
        let prefix = prefix.into();
        let valid = prefix.len() > 1 && prefix.starts_with('/') && !prefix[1..].contains('/');
        if !valid {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("invalid IPC name prefix '{prefix}'"),
            ));
        }
        Ok(Self { prefix })
    }

    pub fn ring(&self) -> String {
        format!("{}_ring", self.prefix)
    }

    pub fn sem_free(&self) -> String {
        format!("{}_free", self.prefix)
    }

    pub fn sem_used(&self) -> String {
        format!("{}_used", self.prefix)
    }

    pub fn sem_mutex(&self) -> String {
        format!("{}_mutex", self.prefix)
    }
}

impl Default for IpcNames {
    fn default() -> Self {
        Self {
            prefix: DEFAULT_PREFIX.to_string(),
        }
    }
}
