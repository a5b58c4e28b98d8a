// Windows service registry integration module

pub mod models;
pub mod reader;
pub mod scm;


pub use models::{ServiceLookup, ServiceRecord};
pub use reader::{ServiceRegistry, StatusReader};
pub use scm::system_registry;

#[cfg(test)]
pub use reader::MockServiceRegistry;
