pub mod frames;
pub mod image_io;
