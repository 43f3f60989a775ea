/// Authentication module
///
/// Password hashing, access token issuing/verification and the
/// server-side session that every token is bound to.

mod claims;
mod jwt;
mod password;
mod session;

pub use claims::Claims;
pub use jwt::{IssuedToken, TokenError, TokenIssuer};
pub use password::{PasswordHasher, MAX_PASSWORD_BYTES};
pub use session::{SessionBinder, SessionKey, SessionView};
