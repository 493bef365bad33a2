pub mod cancel;
pub mod clock;
pub mod context;
pub mod handle;
pub mod tempo;
pub mod transport;

pub(crate) mod executor;
pub(crate) mod scheduler;

pub use cancel::{CancelToken, Canceled};
pub use clock::{Clock, SystemClock};
pub use context::{TimeContext, WaitFuture};
pub use handle::{BranchWait, TaskHandle};
pub use tempo::TempoMap;
pub use transport::Transport;
