mod buffer;
mod layout;
mod names;
mod ring;
mod sem;
mod shutdown;

pub use buffer::{ConsumeOutcome, PublishOutcome, RingConsumer, RingProducer};
pub use names::{DEFAULT_PREFIX, IpcNames};
pub use ring::RingConfig;
pub use sem::WaitOutcome;
pub use shutdown::ShutdownToken;

/// Default number of solution slots in the shared ring.
pub const CAPACITY: usize = 16;
