//! Outgoing email: the `Mailer` transports and the background queue that drives them.

mod queue;
mod sender;
mod templates;

pub use queue::{MailQueue, QueueOptions};
pub use sender::{LogMailer, Mailer, SendGridMailer};
pub use templates::welcome_email;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Email {
    pub to_email: String,
    pub to_name: String,
    pub subject: String,
    pub text: String,
    pub html: String,
}
