//! Authentication: password hashing, session tokens, guards and the account
//! endpoints built on them

pub mod handlers;
pub mod middleware;
pub mod password;
pub mod token;

pub use middleware::{CurrentUser, is_logged_in, protect, protected, require_role, restricted};
pub use password::PasswordHasher;
pub use token::{Claims, TokenSigner};
