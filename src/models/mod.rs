pub mod comment;
pub mod post;
pub mod session;
pub mod user;

pub use comment::*;
pub use post::*;
pub use session::*;
pub use user::*;
