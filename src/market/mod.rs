// Market module - THE STOREFRONT
// Organiser allowlist and official/resale listings, dispatching into events

mod listing;
mod registry;

pub use listing::{Listing, ListingId, ListingKind};
pub use registry::{EventDirectory, MarketplaceRegistry, Purchase, ResaleOffer};
