//! Port Allocator (C2) and App Supervisor (C7): assigns an internal port
//! and registers the running process with an external supervisor.

pub mod app_supervisor;
pub mod port_allocator;

pub use app_supervisor::{
    process_name, start, AppSupervisorClient, CliAppSupervisor, SuperviseError, SuperviseOptions,
};
pub use port_allocator::{PortAllocator, PortAllocatorError};
