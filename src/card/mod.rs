mod form;
pub mod image;
mod record;

pub use form::{read_card, read_snapshot, SnapshotUpload};
pub use image::{EmbeddedImage, ImageError, ImageSlot, PreparedImage};
pub use record::CardRecord;
