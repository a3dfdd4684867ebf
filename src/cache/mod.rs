// Cache module
//
// The proxy keeps no response cache of its own; downstream CDNs and browsers
// cache transformed images based on the header built here.

pub mod control;

pub use control::{CacheControlBuilder, CacheControlConfig};
