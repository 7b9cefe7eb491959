//! Waitlist Allocator: placement requests, zoning resolution, and allocation
//! into the enrollment ledger.

pub mod allocator;
pub mod domain;
pub mod router;

#[cfg(test)]
mod tests;

pub use allocator::{WaitlistAllocator, WaitlistError};
pub use domain::{Allocation, Placement, WaitlistEntry, WaitlistEntryView, WaitlistStatus};
pub use router::waitlist_router;
