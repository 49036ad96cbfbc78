use crate::domain::approval::ApproverRole;
use crate::domain::ports::Authorizer;
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};

/// Role membership fixed at wiring time.
///
/// Grants are engine-wide rather than per organization: in batch-file runs
/// every operation belongs to the same tenant, so scoping grants by user
/// would only duplicate the table.
#[derive(Default, Clone)]
pub struct StaticAuthorizer {
    grants: HashMap<String, HashSet<ApproverRole>>,
}

impl StaticAuthorizer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn grant(&mut self, actor: impl Into<String>, role: ApproverRole) {
        self.grants.entry(actor.into()).or_default().insert(role);
    }
}

#[async_trait]
impl Authorizer for StaticAuthorizer {
    async fn is_authorized(&self, actor: &str, role: ApproverRole, _user_id: &str) -> bool {
        self.grants
            .get(actor)
            .is_some_and(|roles| roles.contains(&role))
    }
}

/// Authorizes every actor for every role. For demos and tests that are not
/// about access control.
#[derive(Default, Clone, Copy)]
pub struct PermissiveAuthorizer;

#[async_trait]
impl Authorizer for PermissiveAuthorizer {
    async fn is_authorized(&self, _actor: &str, _role: ApproverRole, _user_id: &str) -> bool {
        true
    }
}
