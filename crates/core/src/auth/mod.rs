pub mod password;
pub mod token;

pub use password::{hash_password, verify_password, verify_unknown_user, MIN_PASSWORD_LEN};
pub use token::{Claims, TokenError, TokenIssuer};
