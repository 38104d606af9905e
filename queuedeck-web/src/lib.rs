//! Browser console for a single message queue
//!
//! Routes:
//! - `GET /` list view, `GET /read` pop-one-at-a-time view
//! - `GET /refresh`, `GET /read/next` JSON endpoints used by the pages
//! - `POST /add`, `GET /delete/:message_id`, `POST /change_queue`

pub mod handlers;
pub mod pages;
pub mod router;
pub mod session;
mod state;

pub use router::create_router;
pub use session::{Flash, FlashCategory, Session, SessionError, SessionKey, SESSION_COOKIE};
pub use state::ConsoleState;
