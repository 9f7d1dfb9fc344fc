mod memory;
pub mod traits;

pub use memory::InMemoryDocumentTypeStore;
pub use traits::*;
