// Core algorithm exports
pub mod distance;
pub mod hashing;
pub mod index;
pub mod probe;

pub use distance::{l2_squared, normalize};
pub use hashing::{hash_embedding, prepare_text};
pub use index::{FlatIndex, IndexError, Neighbor};
pub use probe::{HealthState, HealthTracker, ProbePolicy};
