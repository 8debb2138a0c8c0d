pub mod magnify;

pub use magnify::VideoMagnifier;
