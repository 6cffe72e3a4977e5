pub mod allocator;
pub mod error;
pub mod gateway;
pub mod headers;
pub mod service;
pub mod store;
pub mod testing;

pub use allocator::{IdentityAllocator, max_allocated_id};
pub use error::IdentityError;
pub use gateway::GatewayIdentityStore;
pub use headers::TrustedHeaders;
pub use service::UserService;
pub use store::IdentityStore;
