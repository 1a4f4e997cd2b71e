pub mod array;
pub mod linked;
pub mod monitor;
pub mod transport;

pub use array::ArrayBuffer;
pub use linked::LinkedBuffer;
pub use monitor::{ChannelMonitor, WakeMonitor};
pub use transport::{BufferEvent, BufferKind, BufferMonitor, RecordBuffer, SharedBuffer};
