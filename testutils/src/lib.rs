mod constants;
mod events;
mod fake;
mod pods;

pub use constants::*;
pub use events::*;
pub use fake::*;
pub use pods::*;
