/// Authentication module
///
/// Token issuing/verification, password hashing, the session lifecycle and
/// the access-token gate.

mod claims;
pub(crate) mod codec;
mod gate;
mod password;
mod session;

pub use claims::Claims;
pub use codec::{TokenCodec, TokenError, TokenKind};
pub use gate::{authorize, bearer_token};
pub use password::{hash_password, verify_password};
pub use session::{SessionManager, TokenPair};
