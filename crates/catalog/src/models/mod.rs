mod catalog;
mod entry;
mod os_path;

pub use self::catalog::Catalog;
pub use self::entry::{BookEntry, BookId, UNKNOWN_AUTHOR};
