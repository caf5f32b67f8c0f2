mod mempool;
mod regpool;

pub use mempool::Mempool;
pub use regpool::Regpool;
