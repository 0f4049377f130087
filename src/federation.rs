//! Federation broker: compiles a caller's identity into the scope filter
//! every read must pass, and authorizes writes per scope.
//!
//! There is no unfiltered read API: every retrieval path routes through
//! [`FederationBroker::can_read`].

use crate::types::{CachedThought, MemoryScope, UserContext, GLOBAL_SCOPE_ID};

/// Role required to write GLOBAL-scope thoughts.
pub const GLOBAL_WRITE_ROLE: &str = "archive:write_global";

pub struct FederationBroker;

impl FederationBroker {
    /// Pure scope-and-roles predicate.
    ///
    /// A thought is readable when its scope arm admits the caller AND the
    /// caller holds every role the thought requires (conjunctive).
    pub fn can_read(ctx: &UserContext, thought: &CachedThought) -> bool {
        let scope_ok = match thought.scope {
            MemoryScope::User => thought.owner_id == ctx.user_id,
            MemoryScope::Project => ctx.project_ids.contains(&thought.scope_id),
            MemoryScope::Department => ctx.dept_ids.contains(&thought.scope_id),
            MemoryScope::Client => ctx.client_ids.contains(&thought.scope_id),
            MemoryScope::Global => true,
        };

        scope_ok
            && thought
                .access_roles
                .iter()
                .all(|role| ctx.roles.contains(role))
    }

    /// Compile the context into a reusable filter predicate.
    pub fn compile(ctx: &UserContext) -> ScopeFilter {
        ScopeFilter { ctx: ctx.clone() }
    }

    /// Whether the caller may create a thought under the given scope.
    pub fn can_write(ctx: &UserContext, scope: MemoryScope, scope_id: &str) -> bool {
        match scope {
            MemoryScope::User => scope_id == ctx.user_id,
            MemoryScope::Project => ctx.project_ids.contains(scope_id),
            MemoryScope::Department => ctx.dept_ids.contains(scope_id),
            MemoryScope::Client => ctx.client_ids.contains(scope_id),
            MemoryScope::Global => {
                scope_id == GLOBAL_SCOPE_ID && ctx.roles.contains(GLOBAL_WRITE_ROLE)
            }
        }
    }
}

/// A compiled scope filter, cheap to apply per candidate.
pub struct ScopeFilter {
    ctx: UserContext,
}

impl ScopeFilter {
    pub fn matches(&self, thought: &CachedThought) -> bool {
        FederationBroker::can_read(&self.ctx, thought)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ThoughtId;
    use chrono::Utc;
    use std::collections::BTreeSet;

    fn thought(scope: MemoryScope, scope_id: &str, owner: &str) -> CachedThought {
        CachedThought {
            id: ThoughtId::new(),
            vector: vec![1.0],
            entities: BTreeSet::new(),
            scope,
            scope_id: scope_id.to_string(),
            owner_id: owner.to_string(),
            prompt_text: String::new(),
            reasoning_trace: String::new(),
            final_response: String::new(),
            source_urns: vec![],
            is_stale: false,
            created_at: Utc::now(),
            ttl_seconds: 3600,
            access_roles: BTreeSet::new(),
        }
    }

    fn ctx_with_dept(user: &str, dept: &str) -> UserContext {
        let mut ctx = UserContext::new(user);
        ctx.dept_ids.insert(dept.to_string());
        ctx
    }

    #[test]
    fn test_user_scope_requires_ownership() {
        let t = thought(MemoryScope::User, "u1", "u1");
        assert!(FederationBroker::can_read(&UserContext::new("u1"), &t));
        assert!(!FederationBroker::can_read(&UserContext::new("u2"), &t));
    }

    #[test]
    fn test_department_scope_requires_membership() {
        let t = thought(MemoryScope::Department, "dept_rnd", "senior");
        assert!(FederationBroker::can_read(
            &ctx_with_dept("junior", "dept_rnd"),
            &t
        ));
        assert!(!FederationBroker::can_read(
            &ctx_with_dept("junior", "dept_compliance"),
            &t
        ));
    }

    #[test]
    fn test_global_scope_readable_by_anyone() {
        let t = thought(MemoryScope::Global, GLOBAL_SCOPE_ID, "admin");
        assert!(FederationBroker::can_read(&UserContext::new("anyone"), &t));
    }

    #[test]
    fn test_access_roles_are_conjunctive() {
        let mut t = thought(MemoryScope::Global, GLOBAL_SCOPE_ID, "admin");
        t.access_roles.insert("analyst".to_string());
        t.access_roles.insert("clearance:high".to_string());

        let mut ctx = UserContext::new("u1");
        ctx.roles.insert("analyst".to_string());
        assert!(!FederationBroker::can_read(&ctx, &t));

        ctx.roles.insert("clearance:high".to_string());
        assert!(FederationBroker::can_read(&ctx, &t));
    }

    #[test]
    fn test_compiled_filter_matches_pure_fn() {
        let t = thought(MemoryScope::Department, "dept_rnd", "senior");
        let ctx = ctx_with_dept("junior", "dept_rnd");
        let filter = FederationBroker::compile(&ctx);

        assert_eq!(filter.matches(&t), FederationBroker::can_read(&ctx, &t));
    }

    #[test]
    fn test_write_user_scope() {
        let ctx = UserContext::new("u1");
        assert!(FederationBroker::can_write(&ctx, MemoryScope::User, "u1"));
        assert!(!FederationBroker::can_write(&ctx, MemoryScope::User, "u2"));
    }

    #[test]
    fn test_write_project_scope() {
        let mut ctx = UserContext::new("u1");
        ctx.project_ids.insert("project_apollo".to_string());
        assert!(FederationBroker::can_write(
            &ctx,
            MemoryScope::Project,
            "project_apollo"
        ));
        assert!(!FederationBroker::can_write(
            &ctx,
            MemoryScope::Project,
            "project_zeus"
        ));
    }

    #[test]
    fn test_write_global_requires_role() {
        let mut ctx = UserContext::new("u1");
        assert!(!FederationBroker::can_write(
            &ctx,
            MemoryScope::Global,
            GLOBAL_SCOPE_ID
        ));

        ctx.roles.insert(GLOBAL_WRITE_ROLE.to_string());
        assert!(FederationBroker::can_write(
            &ctx,
            MemoryScope::Global,
            GLOBAL_SCOPE_ID
        ));
        // Even with the role, the sentinel scope id is required
        assert!(!FederationBroker::can_write(
            &ctx,
            MemoryScope::Global,
            "dept_rnd"
        ));
    }
}
