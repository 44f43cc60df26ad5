//! Authentication module
//!
//! Bearer JWT verification supplying the caller's user id and role.

mod jwt;

pub use jwt::{generate_access_token, verify_token, Claims, JwtConfig, JwtError, UserRole};
