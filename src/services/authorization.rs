use std::collections::HashSet;

/// Decides who may run admin-only operations (deduction, coupon, DLQ).
pub trait AuthorizationPolicy: Send + Sync {
    fn is_admin(&self, user: &str) -> bool;
}

/// Fixed set of admin user names, loaded from `ADMIN_USERS`.
#[derive(Debug, Clone, Default)]
pub struct AdminAllowList {
    admins: HashSet<String>,
}

impl AdminAllowList {
    pub fn new<I, S>(admins: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            admins: admins
                .into_iter()
                .map(Into::into)
                .filter(|name: &String| !name.is_empty())
                .collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.admins.len()
    }

    pub fn is_empty(&self) -> bool {
        self.admins.is_empty()
    }
}

impl AuthorizationPolicy for AdminAllowList {
    fn is_admin(&self, user: &str) -> bool {
        self.admins.contains(user)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_allow_list_matches_exact_names() {
        let policy = AdminAllowList::new(["admin", "datafoundry"]);
        assert!(policy.is_admin("admin"));
        assert!(policy.is_admin("datafoundry"));
        assert!(!policy.is_admin("Admin"));
        assert!(!policy.is_admin("alice"));
    }

    #[test]
    fn test_empty_names_are_ignored() {
        let policy = AdminAllowList::new(vec![String::new(), "root".to_string()]);
        assert_eq!(policy.len(), 1);
        assert!(!policy.is_admin(""));
    }
}
