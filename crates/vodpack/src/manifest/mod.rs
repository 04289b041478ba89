//! Playlist text handling: reference resolution, parsing and variant selection.

pub mod parser;
pub mod uri;
pub mod variant;

use serde::{Deserialize, Serialize};

pub use parser::{ParsedManifest, parse};
pub use uri::{BaseUrl, strip_query};
pub use variant::{VariantSelectionPolicy, select_variant};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Resolution {
    pub width: u32,
    pub height: u32,
}

impl std::fmt::Display for Resolution {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}
