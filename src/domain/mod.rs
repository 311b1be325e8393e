/// A persisted member and its balance
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Member {
    /// Unique identifier for the `Member`
    ///
    /// This never changes once the member has been saved.
    pub member_id: String,
    /// Current balance
    pub money: i64,
}

impl Member {
    pub fn new(member_id: impl Into<String>, money: i64) -> Self {
        Self {
            member_id: member_id.into(),
            money,
        }
    }

    /// Whether this member can be persisted
    pub fn has_identifier(&self) -> bool {
        !self.member_id.is_empty()
    }
}
