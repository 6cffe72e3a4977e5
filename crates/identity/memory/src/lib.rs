mod store;

pub use store::MemoryIdentityStore;
