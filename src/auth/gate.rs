use tracing::warn;
use uuid::Uuid;

use super::session::CurrentUser;
use crate::error::{AppError, AppResult};
use crate::users::repo_types::UserAccount;

/// Access checks. Every denial is the same `Unauthorized`, so callers learn
/// nothing about why.
impl CurrentUser {
    pub fn require_logged_in(&self) -> AppResult<&UserAccount> {
        self.0.user().ok_or_else(AppError::unauthorized)
    }

    pub fn require_self_or_admin(&self, target: Uuid) -> AppResult<&UserAccount> {
        let user = self.require_logged_in()?;
        if user.id == target || user.admin {
            Ok(user)
        } else {
            warn!(user_id = %user.id, target = %target, "access to another account denied");
            Err(AppError::unauthorized())
        }
    }

    pub fn require_admin(&self) -> AppResult<&UserAccount> {
        let user = self.require_logged_in()?;
        if user.admin {
            Ok(user)
        } else {
            warn!(user_id = %user.id, "admin access denied");
            Err(AppError::unauthorized())
        }
    }
}
