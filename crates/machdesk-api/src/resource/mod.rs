// Paginated resource endpoint access

mod client;

pub use client::ResourceClient;

/// One page of a collection, with the pagination metadata the server
/// reported alongside it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Page<T> {
    /// Records in response order.
    pub items: Vec<T>,
    pub total: Option<u64>,
    pub page: Option<u32>,
    pub pages: Option<u32>,
}
