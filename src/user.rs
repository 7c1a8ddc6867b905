use serde::Serialize;

pub type UserId = i64;

/// The authenticated requester, as supplied by the identity collaborator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct User {
    pub id: UserId,
    pub username: String,
    pub is_staff: bool,
}

impl User {
    pub fn owns(&self, user_id: UserId) -> bool {
        self.id == user_id
    }

    pub fn may_view_booking_of(&self, owner: UserId) -> bool {
        self.is_staff || self.owns(owner)
    }
}
