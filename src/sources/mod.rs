pub mod file;
pub mod mock;
pub mod tcp;
pub mod traits;

pub use file::{FileSource, FileSourceConfig};
pub use mock::{ScriptEvent, ScriptedSource};
pub use tcp::{TcpSource, TcpSourceConfig};
pub use traits::{ConnectError, ReadOutcome, StreamSource};
