pub mod permissions;
pub mod resolver;

pub use permissions::{Permission, permissions_for};
pub use resolver::PermissionResolver;
