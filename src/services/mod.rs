mod notifier;
pub mod telegram;
mod transport;

pub use notifier::Notifier;
pub use telegram::TelegramClient;
pub use transport::BotTransport;
