//! Centralized authorization matrix for the chat layer.
//!
//! Every role check the chat endpoints need lives here, expressed over
//! plain relationship facts, so handlers never re-derive who may see
//! what.

use uuid::Uuid;

use crate::models::{OrderParticipants, UserRole};

/// May `user_id` with `role` read the order-scoped thread?
///
/// Permitted: the buying user, admins, support staff, and sellers that
/// own at least one item inside the order.
pub fn can_view_order_thread(order: &OrderParticipants, user_id: Uuid, role: UserRole) -> bool {
    order.buyer_id == user_id
        || role == UserRole::Admin
        || role == UserRole::Support
        || (role == UserRole::Seller && order.has_seller(user_id))
}

/// May `role` see the support queue and resolve/delete conversations?
pub fn can_manage_conversations(role: UserRole) -> bool {
    role.is_staff()
}
