//! Password hashing, session tokens, and login.

pub mod login;
pub mod password;
pub mod token;

pub use login::{login, LoginOutcome, LoginRequest};
pub use password::{hash_password, verify_password};
pub use token::{token_from_parts, Claims, TokenService, ADMIN_ROLE};
