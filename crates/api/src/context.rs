use stockledger_core::UserId;

/// Who is acting on a request.
///
/// Taken from the optional `x-user-id` header. There is no authentication:
/// the id is recorded as `createdBy` and nothing else.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq)]
pub struct ActorContext {
    user_id: Option<UserId>,
}

impl ActorContext {
    pub fn new(user_id: Option<UserId>) -> Self {
        Self { user_id }
    }

    pub fn anonymous() -> Self {
        Self::default()
    }

    pub fn user_id(&self) -> Option<UserId> {
        self.user_id
    }
}
