//! Persistence adapters for the hierarchy and order repositories
//!
//! Both adapters implement
//! [`HierarchyRepository`](hq_application::HierarchyRepository) and
//! [`OrderRepository`](hq_application::OrderRepository) on one value, so a
//! single `Arc` can back both ports.
//!
//! | Adapter | Durability | Atomic unit |
//! |---------|------------|-------------|
//! | [`InMemoryStore`] | process lifetime | one `Mutex` guard |
//! | [`SqliteStore`] | file | one SQL transaction |

mod memory;
mod sqlite;

pub use memory::InMemoryStore;
pub use sqlite::SqliteStore;
