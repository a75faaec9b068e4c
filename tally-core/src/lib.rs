pub mod errors;
pub mod identity;
pub mod models;

pub use errors::*;
pub use identity::*;
pub use models::*;
