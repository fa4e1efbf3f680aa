pub mod message;
pub mod name;
