pub mod catalogue;
pub mod html;
pub mod source;

#[cfg(test)]
mod tests;

pub use catalogue::{CatalogueOptions, Entry, parse_catalogue, read_catalogue};
pub use source::SourceDocs;
