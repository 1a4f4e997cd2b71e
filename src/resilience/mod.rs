pub mod exception_handler;
pub mod policy;

pub use exception_handler::{ExceptionHandler, FatalCondition, FaultOrigin};
pub use policy::DataFaultPolicy;
