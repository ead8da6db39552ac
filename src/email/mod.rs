/// Email dispatcher module and its detail sub-modules
pub mod dispatcher;
pub mod login;
pub mod transport;

pub use dispatcher::{EmailModule, DEFAULT_BODY_TEMPLATE};
pub use login::LoginModule;
pub use transport::{LogTransport, Notification, SendmailTransport, Transport};
