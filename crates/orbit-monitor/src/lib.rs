mod error;
mod events;
mod introspection;
mod monitor;

pub use error::MonitorError;
pub use events::TaskEventLog;
pub use introspection::{QueueIntrospection, TaskSnapshot};
pub use monitor::{CancelAck, CancelStatus, ComprehensiveStatus, TaskMonitor};
