//! Reelsmith Media
//!
//! Everything the render engine needs to know about its inputs:
//! - **Probe:** ffprobe output parsing into [`MediaInfo`]
//! - **Toolkit:** the [`MediaToolkit`] seam and its ffmpeg implementation
//! - **PCM:** interleaved 16-bit sample buffers and WAV I/O
//! - **Handles:** [`MediaResource`], an opened input that releases its
//!   decode state on close or drop

pub mod handle;
pub mod pcm;
pub mod probe;
pub mod toolkit;

pub use handle::*;
pub use pcm::*;
pub use probe::*;
pub use toolkit::*;
