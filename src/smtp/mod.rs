//! SMTP delivery: authentication mechanisms, the session driver and the
//! [`MailTransport`] seam used by the handler.
//!
//! The session speaks the protocol directly over tokio so that LOGIN
//! prompts can be matched literally and every step carries its own
//! deadline.

pub mod auth;
mod reply;
pub mod session;
mod stream;
pub mod transport;

pub use auth::{Authenticator, LoginAuth, PlainAuth, ServerInfo};
pub use reply::{Extensions, Reply};
pub use session::{Session, dot_stuff};
pub use transport::{Envelope, MailTransport, SmtpTransport, StdoutTransport};
