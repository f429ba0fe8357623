pub mod admin;
pub mod album;
pub mod image;
pub mod shared;
pub mod tag;
pub mod upload;
