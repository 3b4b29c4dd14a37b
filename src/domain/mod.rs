mod decision;
mod manuscript;
mod query;
mod review;
mod roles;
mod status;

pub use decision::*;
pub use manuscript::*;
pub use query::*;
pub use review::*;
pub use roles::*;
pub use status::*;
