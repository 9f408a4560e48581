//! Repository traits for metadata operations.

pub mod access_tokens;
pub mod shares;

pub use access_tokens::AccessTokenRepo;
pub use shares::ShareRepo;
