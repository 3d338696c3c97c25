//! Font database access.
//!
//! One read-only handle shared by every conversion. Faces come from the
//! system scan or from runtime-registered bytes; resolution itself never
//! touches the filesystem.

use crate::style::{FontStretch, FontStyle as RequestStyle};
use crate::tree::{FontFace, FontStyle};

/// The font collaborator queried during text layout.
pub struct FontDatabase {
    db: fontdb::Database,
}

impl FontDatabase {
    /// An empty database. Text still resolves, via heuristic metrics, so
    /// documents without fonts degrade instead of failing.
    pub fn new() -> Self {
        FontDatabase {
            db: fontdb::Database::new(),
        }
    }

    /// A database seeded with the system font scan.
    pub fn with_system_fonts() -> Self {
        let mut db = fontdb::Database::new();
        db.load_system_fonts();
        FontDatabase { db }
    }

    /// Registers an in-memory face (TTF/OTF bytes, including collections).
    pub fn register(&mut self, data: Vec<u8>) {
        self.db.load_font_data(data);
    }

    pub fn is_empty(&self) -> bool {
        self.db.is_empty()
    }

    pub fn len(&self) -> usize {
        self.db.len()
    }

    /// Walks the family fallback list and returns the first matching face.
    pub fn query(
        &self,
        families: &[String],
        weight: u16,
        style: RequestStyle,
        stretch: FontStretch,
    ) -> Option<fontdb::ID> {
        let families: Vec<fontdb::Family> =
            families.iter().map(|name| family_of(name)).collect();
        let query = fontdb::Query {
            families: &families,
            weight: fontdb::Weight(weight),
            stretch: stretch_of(stretch),
            style: match style {
                RequestStyle::Normal => fontdb::Style::Normal,
                RequestStyle::Italic => fontdb::Style::Italic,
                RequestStyle::Oblique => fontdb::Style::Oblique,
            },
        };
        self.db.query(&query)
    }

    /// The concrete identity of a face, for the output tree.
    pub fn face_identity(&self, id: fontdb::ID) -> Option<FontFace> {
        let info = self.db.face(id)?;
        let family = info
            .families
            .first()
            .map(|(name, _)| name.clone())
            .unwrap_or_else(|| info.post_script_name.clone());
        Some(FontFace {
            family,
            weight: info.weight.0,
            style: match info.style {
                fontdb::Style::Normal => FontStyle::Normal,
                fontdb::Style::Italic => FontStyle::Italic,
                fontdb::Style::Oblique => FontStyle::Oblique,
            },
        })
    }

    /// Runs `f` over the face's raw bytes.
    pub fn with_face_data<P, T>(&self, id: fontdb::ID, f: P) -> Option<T>
    where
        P: FnOnce(&[u8], u32) -> T,
    {
        self.db.with_face_data(id, f)
    }
}

impl Default for FontDatabase {
    fn default() -> Self {
        FontDatabase::new()
    }
}

fn family_of(name: &str) -> fontdb::Family<'_> {
    match name {
        "serif" => fontdb::Family::Serif,
        "sans-serif" => fontdb::Family::SansSerif,
        "monospace" => fontdb::Family::Monospace,
        "cursive" => fontdb::Family::Cursive,
        "fantasy" => fontdb::Family::Fantasy,
        other => fontdb::Family::Name(other),
    }
}

fn stretch_of(stretch: FontStretch) -> fontdb::Stretch {
    match stretch {
        FontStretch::UltraCondensed => fontdb::Stretch::UltraCondensed,
        FontStretch::ExtraCondensed => fontdb::Stretch::ExtraCondensed,
        FontStretch::Condensed => fontdb::Stretch::Condensed,
        FontStretch::SemiCondensed => fontdb::Stretch::SemiCondensed,
        FontStretch::Normal => fontdb::Stretch::Normal,
        FontStretch::SemiExpanded => fontdb::Stretch::SemiExpanded,
        FontStretch::Expanded => fontdb::Stretch::Expanded,
        FontStretch::ExtraExpanded => fontdb::Stretch::ExtraExpanded,
        FontStretch::UltraExpanded => fontdb::Stretch::UltraExpanded,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generic_families_map_to_fontdb_kinds() {
        assert!(matches!(family_of("serif"), fontdb::Family::Serif));
        assert!(matches!(family_of("sans-serif"), fontdb::Family::SansSerif));
        assert!(matches!(family_of("Arial"), fontdb::Family::Name("Arial")));
    }

    #[test]
    fn empty_database_resolves_nothing() {
        let db = FontDatabase::new();
        assert!(db.is_empty());
        let id = db.query(
            &["sans-serif".to_string()],
            400,
            RequestStyle::Normal,
            FontStretch::Normal,
        );
        assert!(id.is_none());
    }
}
