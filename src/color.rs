use std::collections::{BTreeMap, BTreeSet, HashSet};

use eframe::egui::Color32;
use palette::{Hsl, IntoColor, Srgb};

// ---------------------------------------------------------------------------
// Color palette generator
// ---------------------------------------------------------------------------

/// Generates `n` visually distinct colours using evenly spaced hues.
pub fn generate_palette(n: usize) -> Vec<Color32> {
    if n == 0 {
        return Vec::new();
    }
    (0..n)
        .map(|i| {
            let hue = (i as f32 / n as f32) * 360.0;
            let hsl = Hsl::new(hue, 0.75, 0.55);
            let rgb: Srgb = hsl.into_color();
            Color32::from_rgb(
                (rgb.red * 255.0) as u8,
                (rgb.green * 255.0) as u8,
                (rgb.blue * 255.0) as u8,
            )
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Color mapping: category value → Color32
// ---------------------------------------------------------------------------

/// Maps the unique values of a chart's colour dimension (vehicle type,
/// manufacturer) to distinct colours.
#[derive(Debug, Clone)]
pub struct CategoryColors {
    mapping: BTreeMap<String, Color32>,
    default_color: Color32,
}

impl CategoryColors {
    /// Build a colour map from the values of a category column; duplicates
    /// collapse to one entry.
    pub fn new<I, S>(values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let unique: BTreeSet<String> = values.into_iter().map(Into::into).collect();
        let palette = generate_palette(unique.len());
        let mapping: BTreeMap<String, Color32> =
            unique.into_iter().zip(palette.into_iter()).collect();

        CategoryColors {
            mapping,
            default_color: Color32::GRAY,
        }
    }

    /// Look up the colour for a category value.
    pub fn color_for(&self, value: &str) -> Color32 {
        self.mapping
            .get(value)
            .copied()
            .unwrap_or(self.default_color)
    }

    /// Legend entries (value label → colour) in label order.
    pub fn legend_entries(&self) -> Vec<(String, Color32)> {
        self.mapping
            .iter()
            .map(|(value, color)| (value.clone(), *color))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn palette_is_distinct_and_sized() {
        let palette = generate_palette(4);
        assert_eq!(palette.len(), 4);
        let unique: HashSet<_> = palette.iter().collect();
        assert_eq!(unique.len(), 4);
        assert!(generate_palette(0).is_empty());
    }

    #[test]
    fn duplicate_values_share_a_color() {
        let colors = CategoryColors::new(["BEV", "PHEV", "BEV"]);
        assert_eq!(colors.legend_entries().len(), 2);
        assert_eq!(colors.color_for("BEV"), colors.color_for("BEV"));
        assert_ne!(colors.color_for("BEV"), colors.color_for("PHEV"));
    }

    #[test]
    fn unknown_values_fall_back_to_the_default() {
        let colors = CategoryColors::new(["BEV"]);
        assert_eq!(colors.color_for("FCEV"), Color32::GRAY);
    }
}
