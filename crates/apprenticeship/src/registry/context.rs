use serde::Serialize;
use uuid::Uuid;

use super::domain::UserId;

/// Caller identity as supplied by the fronting gateway. Not authenticated here.
///
/// Only the id is carried; roles are read from the stored user record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Actor {
    pub user_id: UserId,
}

/// Request-scoped context threaded explicitly into every service operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestContext {
    pub request_id: Uuid,
    pub actor: Option<Actor>,
}

impl RequestContext {
    pub fn new(request_id: Uuid, actor: Option<Actor>) -> Self {
        Self { request_id, actor }
    }

    /// Context for internal callers (CLI, worker, tests) with no acting user.
    pub fn system() -> Self {
        Self::new(Uuid::new_v4(), None)
    }

    pub fn for_actor(user_id: UserId) -> Self {
        Self::new(Uuid::new_v4(), Some(Actor { user_id }))
    }

    pub fn actor_id(&self) -> Option<&UserId> {
        self.actor.as_ref().map(|actor| &actor.user_id)
    }
}
