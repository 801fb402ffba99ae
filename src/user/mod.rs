pub mod nonce;
pub mod permissions;
mod principal;

pub use nonce::{NonceAge, NonceManager, NONCE_SECRET_OPTION};
pub use permissions::{Capability, UserRole};
#[cfg(feature = "mock")]
pub use principal::MockPrincipal;
pub use principal::{Operator, Principal};
