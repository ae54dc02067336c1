// This is free and unencumbered software released into the public domain.

mod config;
pub use config::*;

mod effects;
pub use effects::*;

mod engine;
pub use engine::*;

mod error;
pub use error::*;

mod frame;
pub use frame::*;

mod open;
pub use open::*;

mod pool;
pub use pool::*;

mod repack;
pub use repack::*;

mod session;
pub use session::*;

mod source;
pub use source::*;

pub mod drivers {
    #[cfg(feature = "ffmpeg")]
    pub mod ffmpeg;

    pub mod synthetic;
}

pub mod testing;
