use uuid::Uuid;

/// The slice of an order the chat layer needs: who bought it and which
/// sellers own items inside it. Resolved through the order directory,
/// never stored by the chat core.
#[derive(Debug, Clone)]
pub struct OrderParticipants {
    pub order_id: Uuid,
    pub buyer_id: Uuid,
    pub item_owner_ids: Vec<Uuid>,
}

impl OrderParticipants {
    pub fn has_seller(&self, user_id: Uuid) -> bool {
        self.item_owner_ids.contains(&user_id)
    }
}
