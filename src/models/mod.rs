pub mod archive;
pub mod courier;
pub mod order;
