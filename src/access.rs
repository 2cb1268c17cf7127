use std::collections::HashSet;

use uuid::Uuid;

/// Capability checks consumed by moderation, voting and deletion paths.
/// Administrators are a configured email allow-list resolved once at startup.
pub struct AccessControl {
    admins: HashSet<String>,
}

impl AccessControl {
    pub fn new<I>(admin_emails: I) -> Self
    where
        I: IntoIterator<Item = String>,
    {
        Self {
            admins: admin_emails.into_iter().map(|e| e.to_lowercase()).collect(),
        }
    }

    pub fn is_admin(&self, email: &str) -> bool {
        self.admins.contains(&email.to_lowercase())
    }
}

pub fn is_owner(user_id: Uuid, owner_id: Uuid) -> bool {
    user_id == owner_id
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn admin_check_is_case_insensitive() {
        let access = AccessControl::new(vec!["Admin@Example.com".to_string()]);
        assert!(access.is_admin("admin@example.com"));
        assert!(access.is_admin("ADMIN@EXAMPLE.COM"));
        assert!(!access.is_admin("user@example.com"));
    }

    #[test]
    fn owner_check_compares_identifiers() {
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        assert!(is_owner(a, a));
        assert!(!is_owner(a, b));
    }
}
