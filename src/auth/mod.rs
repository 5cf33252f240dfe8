pub mod credentials;
pub mod session;

pub use credentials::{AuthMethod, Credentials, HeaderSet};
pub use session::{parse_auth_header, secrets_equal, AuthCallback, SessionAuthenticator};
