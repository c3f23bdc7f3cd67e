pub mod command;
pub mod packet;
pub mod primitive;
pub mod response;
mod row;

pub use row::{RowRef, TextValues};
