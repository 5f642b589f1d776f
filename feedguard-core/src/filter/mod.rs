pub mod resolver;
pub mod policy;
pub mod toggle;

pub use resolver::IdentityResolver;
pub use policy::decide;
pub use toggle::ToggleRegistry;
