//! Request handlers

pub mod assets;
pub mod media;
pub mod translations;

pub use assets::*;
pub use media::*;
pub use translations::*;
