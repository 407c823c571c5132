pub mod session;

pub use session::{RequireUser, SESSION_COOKIE, Viewer};
