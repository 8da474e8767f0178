pub mod context;
pub mod error;
pub mod middleware;
pub mod roles;

pub use common_auth::Role;
pub use context::{SecurityContext, SecurityCtxExtractor};
pub use error::SecurityError;
pub use middleware::{authenticate, require_admin};
pub use roles::{ensure_admin, ensure_owner_or_admin};
