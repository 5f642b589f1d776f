pub mod memory;
pub mod fixture;

pub use memory::MemoryDom;
pub use fixture::PageFixture;
