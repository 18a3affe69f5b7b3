use crate::{
    db_types::{FullOrder, NewOrder, Order, OrderId, Price},
    traits::LedgerError,
};

/// Order storage. Orders are never physically removed; deleting one only marks it.
///
/// Soft-deleted orders are invisible to every fetch method.
#[allow(async_fn_in_trait)]
pub trait OrderManagement {
    /// Stores a brand-new order with the given price, along with its line items and addresses, in one atomic unit.
    /// The order starts out `pending` on every axis.
    async fn insert_order(&self, order: NewOrder, price: Price) -> Result<Order, LedgerError>;

    async fn fetch_order(&self, order_id: &OrderId) -> Result<Option<Order>, LedgerError>;

    /// Fetches the order together with its line items, addresses and transactions (oldest first).
    async fn fetch_full_order(&self, order_id: &OrderId) -> Result<Option<FullOrder>, LedgerError>;

    /// Writes the editable details of `order` (owner, email, coupon and addresses) back to the store.
    ///
    /// Returns [`LedgerError::ModificationForbidden`] if `order` differs from the stored order in its states or priced
    /// fields, which only settlement and shipping may change. An owner cannot change once set.
    async fn save_order(&self, order: &Order) -> Result<Order, LedgerError>;

    /// Moves a paid order to `shipped`.
    async fn mark_order_shipped(&self, order_id: &OrderId) -> Result<Order, LedgerError>;

    /// Sets `deleted_at` on the order. Returns the order as it was at deletion time.
    async fn soft_delete_order(&self, order_id: &OrderId) -> Result<Order, LedgerError>;
}
