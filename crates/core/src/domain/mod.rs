pub mod cart;
pub mod checkpoint;
pub mod conversation;
pub mod product;
pub mod session;
