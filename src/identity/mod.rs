//! Identity and session authorization for zelid-signed requests.
//! Keep the public surface thin and split implementation across sub-modules.

pub mod address;
pub mod message;
mod scheme;
mod auth_header;
mod session;
mod owner;
mod authorizer;

pub use scheme::{IdentityScheme, BitcoinMessageScheme};
pub use auth_header::{ZelIdAuth, ZELIDAUTH_HEADER};
pub use session::{SignedSession, SessionManager};
pub use owner::OwnerResolver;
pub use authorizer::{Privilege, PrivilegeEvaluator};
