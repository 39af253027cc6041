pub mod error;
pub mod fragment;
pub mod reader;
pub mod view;

pub use error::ReadError;
pub use fragment::{RawDetailFragment, RawFragment};
pub use reader::{HttpPageReader, PageReader};
pub use view::MapView;
