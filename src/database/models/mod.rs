mod app;
mod hub;
mod message;
mod token;
mod user;

pub use app::App;
pub use hub::Hub;
pub use message::{NewReceivedMessage, NewSentMessage, ReceivedMessage, SentMessage};
pub use token::Token;
pub use user::{NewUser, User};
