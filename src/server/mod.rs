pub mod listener;

pub use listener::{Listening, Server};
