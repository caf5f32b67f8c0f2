pub mod block_store;
pub mod topo_index;
pub mod transactions;

pub use vertex_database::prelude::DB;
