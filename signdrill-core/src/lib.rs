pub mod errors;
pub mod filters;
pub mod models;
pub mod progress;
pub mod scheduler;
pub mod session;
pub mod stats;
pub mod store;

pub use errors::*;
pub use filters::*;
pub use models::*;
pub use progress::*;
pub use scheduler::*;
pub use session::*;
pub use stats::*;
pub use store::*;
