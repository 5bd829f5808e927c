//! Data model for crawled blogs
//!
//! - `PostRecord`: one classified post (id, type, timestamp, tags, photo variants)
//! - `BlogDescriptor`: blog identity plus the accumulated post set

mod blog;
mod post;

pub use blog::BlogDescriptor;
pub use post::{
    epoch, local_time_from_epoch, ImageSize, PhotoVariant, PostId, PostRecord, PostType,
};
