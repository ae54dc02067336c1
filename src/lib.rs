// This is free and unencumbered software released into the public domain.

//! A camera-to-AR-effect-engine frame pipeline.
//!
//! Frames captured from a camera source are repacked (chroma planes swapped)
//! into a small ring of reusable buffers and handed to an effect engine
//! together with their geometry metadata. The engine and the platform camera
//! are trait boundaries; external SDK bindings attach there.

pub mod cli;
pub mod shared;
