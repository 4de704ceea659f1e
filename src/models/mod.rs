// Gateway module for models - follows the Train Station Pattern
// All external access must go through this gateway

mod traits;

pub use traits::Model;

#[cfg(test)]
pub use traits::MockModel;
