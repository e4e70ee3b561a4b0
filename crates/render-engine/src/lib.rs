//! Reelsmith Render Engine
//!
//! Offline pipeline that composes a stock video, a narration voiceover,
//! optional background music and sentence captions into one encoded
//! video file.
//!
//! # Pipeline Architecture
//!
//! ```text
//! voiceover.mp3 ──┐
//!                 ├── Audio Mixer (loop + gain + sum)
//! music.mp3 ──────┘         │
//!                           │
//! narration ── Caption Layout Engine
//!                           │         │
//! stock.mp4 ── fit 720 ─────┴─────────┤
//!                                     ▼
//!                            Timeline Compositor
//!                                     │
//!                                     ▼
//!                      Encoder Sink (H.264/AAC, 24 fps)
//!                                     │
//!                                     ▼
//!                                 output.mp4
//! ```

pub mod captions;
pub mod compositor;
pub mod export;
pub mod mixer;
pub mod pipeline;

pub use captions::*;
pub use compositor::*;
pub use export::*;
pub use mixer::*;
pub use pipeline::*;
