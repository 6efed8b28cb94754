pub mod accounting;
pub mod auth;
pub mod companies;
pub mod expenses;
pub mod payments;

use crate::error::ApiError;
use crate::middleware::AuthUser;

pub(crate) fn require_superadmin(user: &AuthUser) -> Result<(), ApiError> {
    if user.is_superadmin() {
        Ok(())
    } else {
        Err(ApiError::forbidden("Super-admin role required"))
    }
}

pub(crate) fn require_bookkeeper(user: &AuthUser) -> Result<(), ApiError> {
    if user.can_manage_books() {
        Ok(())
    } else {
        Err(ApiError::forbidden("Accountant or admin role required"))
    }
}
