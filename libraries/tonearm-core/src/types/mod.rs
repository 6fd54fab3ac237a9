mod media_item;
mod radio;
mod track;

pub use media_item::{MediaItem, MediaItemKind, MediaItemMetadata};
pub use radio::RadioStation;
pub use track::Track;
