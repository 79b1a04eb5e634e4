//! XML element tree and tag reading.

mod reader;
mod tree;

pub use reader::TagReader;
pub use tree::{ElementTree, NodeId, XmlDocument};
