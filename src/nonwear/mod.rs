//! Non-wear detection
//!
//! Two independent classifiers label the recording as worn / not worn:
//! a count-based one over 60 second epochs and a statistical one over the raw
//! samples. Both are left-to-right scans returning a fresh flag vector.

mod choi;
mod vanhees;

pub use choi::{choi_nonwear, choi_wear_flags};
pub use vanhees::van_hees_nonwear;
