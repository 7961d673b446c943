pub mod chat;
pub mod events;
pub mod inventory;
pub mod parse;
pub mod prompts;
pub mod recipes;
pub mod session;
