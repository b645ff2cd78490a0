pub mod items;

pub use items::{ItemStore, PgItemStore, StoreError};

#[cfg(test)]
pub use items::MockItemStore;
