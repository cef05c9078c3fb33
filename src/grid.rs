//! Grid cell records and the provider that supplies them.
//!
//! The grid itself is unbounded; which cells have content is entirely up to
//! the [`GridDataProvider`].

use crate::color::Rgba;
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::HashMap;

/// Content of one grid cell. Every decoration is optional.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GridCell {
    pub x: i64,
    pub y: i64,
    #[serde(default, deserialize_with = "lenient_color")]
    pub background: Option<Rgba>,
    /// Text color
    #[serde(default, deserialize_with = "lenient_color")]
    pub color: Option<Rgba>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub subtitle: Option<String>,
    /// Image URL
    #[serde(default)]
    pub image: Option<String>,
}

impl GridCell {
    pub fn new(x: i64, y: i64) -> Self {
        Self {
            x,
            y,
            ..Self::default()
        }
    }

    pub fn has_text(&self) -> bool {
        self.title.is_some() || self.subtitle.is_some()
    }
}

/// A malformed color is treated as no color rather than a bad record
fn lenient_color<'de, D: Deserializer<'de>>(d: D) -> Result<Option<Rgba>, D::Error> {
    let raw = Option::<serde_json::Value>::deserialize(d)?;
    Ok(raw.as_ref().and_then(serde_json::Value::as_str).and_then(Rgba::parse_hex))
}

/// Source of cell content for integer grid coordinates.
pub trait GridDataProvider {
    fn get(&self, x: i64, y: i64) -> Option<GridCell>;
}

impl GridDataProvider for HashMap<(i64, i64), GridCell> {
    fn get(&self, x: i64, y: i64) -> Option<GridCell> {
        HashMap::get(self, &(x, y)).cloned()
    }
}

/// Provider backed by a closure
pub struct FnProvider<F>(pub F);

impl<F> GridDataProvider for FnProvider<F>
where
    F: Fn(i64, i64) -> Option<GridCell>,
{
    fn get(&self, x: i64, y: i64) -> Option<GridCell> {
        (self.0)(x, y)
    }
}

/// Build a map-backed provider from a JSON array of cell records
pub fn cells_from_json(json_str: &str) -> Result<HashMap<(i64, i64), GridCell>, serde_json::Error> {
    let cells: Vec<GridCell> = serde_json::from_str(json_str)?;
    Ok(cells.into_iter().map(|c| ((c.x, c.y), c)).collect())
}
