pub mod issue;
pub mod recommendation;
pub mod summary;

pub use issue::*;
pub use recommendation::*;
pub use summary::*;
