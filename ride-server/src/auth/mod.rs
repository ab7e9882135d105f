//! Authentication: sessions, roles and the session store.

mod claims;
mod provider;
mod session;

pub use claims::{Claims, ClaimsError};
pub use provider::{Registration, SessionConfig, SessionProvider};
pub use session::{InvalidUserRole, Session, UserRole};
