//! Wire format types for provider-specific API protocols
//!
//! Each module contains pure serde structs matching the respective provider's
//! JSON API format. These types exist only at the serialization boundary;
//! everything internal uses the canonical types.

pub mod anthropic;
pub mod google;
pub mod openai;
