//! Reelsmith Project Model
//!
//! Defines the data contracts shared by the render pipeline:
//! - **Options:** Orientation and validated render options
//! - **Captions:** Sentence captions and their fixed three-second slots
//! - **Overlays:** Caption background/text layers in output pixels
//! - **Frames:** Frame sizes and half-open time windows

pub mod caption;
pub mod frame;
pub mod options;
pub mod overlay;

pub use caption::*;
pub use frame::*;
pub use options::*;
pub use overlay::*;
