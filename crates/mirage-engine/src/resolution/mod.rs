pub mod engine;
pub mod result;
pub mod strategy;

pub use engine::{Resolved, resolve};
pub use result::ResolutionError;
pub use strategy::{Locator, LocatorStrategy};
