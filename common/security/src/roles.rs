use tracing::warn;
use uuid::Uuid;

use crate::context::SecurityContext;
use crate::SecurityError;

pub fn ensure_admin(ctx: &SecurityContext) -> Result<(), SecurityError> {
    if ctx.is_admin() { return Ok(()); }
    warn!(user_id = %ctx.user_id, role = %ctx.role, "admin_check_failed");
    Err(SecurityError::Forbidden)
}

/// Permits the resource owner or any admin.
pub fn ensure_owner_or_admin(ctx: &SecurityContext, owner_id: Uuid) -> Result<(), SecurityError> {
    if ctx.user_id == owner_id || ctx.is_admin() { return Ok(()); }
    warn!(user_id = %ctx.user_id, %owner_id, "ownership_check_failed");
    Err(SecurityError::NotOwner)
}

#[cfg(test)]
mod tests {
    use super::*;
    use common_auth::Role;

    fn ctx(role: Role) -> SecurityContext {
        SecurityContext { user_id: Uuid::new_v4(), role }
    }

    #[test]
    fn admin_gate_matches_enum() {
        assert!(ensure_admin(&ctx(Role::Admin)).is_ok());
        assert_eq!(ensure_admin(&ctx(Role::User)), Err(SecurityError::Forbidden));
    }

    #[test]
    fn owner_or_admin() {
        let owner = ctx(Role::User);
        assert!(ensure_owner_or_admin(&owner, owner.user_id).is_ok());
        assert!(ensure_owner_or_admin(&ctx(Role::Admin), owner.user_id).is_ok());
        assert_eq!(
            ensure_owner_or_admin(&ctx(Role::User), owner.user_id),
            Err(SecurityError::NotOwner)
        );
    }
}
