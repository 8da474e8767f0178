pub mod claims;
pub mod config;
pub mod error;
pub mod extractors;
pub mod roles;
pub mod tokens;

pub use claims::Claims;
pub use config::{parse_ttl, JwtConfig};
pub use error::{AuthError, AuthResult};
pub use extractors::AuthContext;
pub use roles::Role;
pub use tokens::TokenService;
