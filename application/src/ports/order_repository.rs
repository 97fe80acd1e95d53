//! Order ledger persistence port

use super::store_error::StoreError;
use hq_domain::{Order, OrderId, OrderUpdate};

pub trait OrderRepository: Send + Sync {
    fn insert_order(&self, order: &Order) -> Result<(), StoreError>;

    /// Apply a partial update and return the stored result
    fn update_order(&self, id: &OrderId, update: OrderUpdate) -> Result<Order, StoreError>;

    fn get_order(&self, id: &OrderId) -> Result<Option<Order>, StoreError>;

    /// Most recent first
    fn list_orders(&self, limit: usize) -> Result<Vec<Order>, StoreError>;
}
