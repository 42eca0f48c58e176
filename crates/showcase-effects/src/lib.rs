//! Frame-by-frame state behind the site's visual effects. Nothing here draws;
//! callers feed in time, viewport and scroll measurements and render the
//! numbers that come back.

pub mod counter;
pub mod particles;
pub mod scroll;

pub use counter::{Counter, CounterConfig, ease_out_cubic, format_number};
pub use particles::{FieldConfig, Link, Particle, ParticleField};
pub use scroll::{ScrollIndicator, scroll_progress};
