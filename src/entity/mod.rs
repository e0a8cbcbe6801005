pub mod registry;
pub mod types;
pub mod validator;

pub use registry::MappingRegistry;
pub use types::*;
pub use validator::validate;
