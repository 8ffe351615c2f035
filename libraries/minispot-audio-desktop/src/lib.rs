//! Desktop audio for minispot
//!
//! - [`CpalBackend`]: cross-platform output through CPAL, invoking the
//!   engine's render callback from the device thread
//! - [`SymphoniaDecoderFactory`]: streaming Ogg Vorbis decoding with Symphonia

mod backend;
mod decoder;
mod error;

pub use backend::CpalBackend;
pub use decoder::{SymphoniaDecoder, SymphoniaDecoderFactory};
pub use error::{AudioError, Result};
