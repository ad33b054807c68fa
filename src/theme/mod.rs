//! Cached theme values and the fixed accent palette.

use std::fmt;

pub mod palette;

pub use palette::{accent_color_for, AccentColor, UNSET_ACCENT_INDEX};

/// An opaque RGB color as used by the presentation layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Color {
    pub const fn new_rgb(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    /// `#rrggbb` representation.
    pub fn to_hex(self) -> String {
        format!("#{:02x}{:02x}{:02x}", self.r, self.g, self.b)
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

pub const DEFAULT_FONT_SIZE: f64 = 9.0;
pub const DEFAULT_FONT_FAMILY: &str = "Noto Sans";

/// Local copy of the provider's theme settings.
///
/// `accent_color` is only ever written together with `accent_color_index`,
/// through the palette lookup.
#[derive(Debug, Clone, PartialEq)]
pub struct ThemeState {
    pub(crate) dark_mode: bool,
    pub(crate) accent_color_index: i32,
    pub(crate) accent_color: Color,
    pub(crate) font_size: f64,
    pub(crate) font_family: String,
}

impl Default for ThemeState {
    fn default() -> Self {
        Self {
            dark_mode: false,
            accent_color_index: UNSET_ACCENT_INDEX,
            accent_color: AccentColor::Blue.color(),
            font_size: DEFAULT_FONT_SIZE,
            font_family: DEFAULT_FONT_FAMILY.to_string(),
        }
    }
}

impl ThemeState {
    pub fn dark_mode(&self) -> bool {
        self.dark_mode
    }

    pub fn accent_color_index(&self) -> i32 {
        self.accent_color_index
    }

    pub fn accent_color(&self) -> Color {
        self.accent_color
    }

    pub fn font_size(&self) -> f64 {
        self.font_size
    }

    pub fn font_family(&self) -> &str {
        &self.font_family
    }

    /// Stores `index` and derives the matching palette color.
    pub(crate) fn assign_accent(&mut self, index: i32) {
        self.accent_color_index = index;
        self.accent_color = accent_color_for(index);
    }
}

/// The observable fields of [`ThemeState`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ThemeProperty {
    DarkMode,
    AccentColorIndex,
    AccentColor,
    FontSize,
    FontFamily,
}

impl ThemeProperty {
    pub const ALL: &'static [ThemeProperty] = &[
        ThemeProperty::DarkMode,
        ThemeProperty::AccentColorIndex,
        ThemeProperty::AccentColor,
        ThemeProperty::FontSize,
        ThemeProperty::FontFamily,
    ];
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_provisional_values() {
        let state = ThemeState::default();
        assert!(!state.dark_mode());
        assert_eq!(state.accent_color_index(), UNSET_ACCENT_INDEX);
        assert_eq!(state.accent_color(), AccentColor::Blue.color());
        assert_eq!(state.font_size(), 9.0);
        assert_eq!(state.font_family(), "Noto Sans");
    }

    #[test]
    fn assign_accent_keeps_color_in_step_with_index() {
        let mut state = ThemeState::default();
        state.assign_accent(AccentColor::Pink as i32);
        assert_eq!(state.accent_color_index(), 4);
        assert_eq!(state.accent_color(), AccentColor::Pink.color());

        state.assign_accent(99);
        assert_eq!(state.accent_color_index(), 99);
        assert_eq!(state.accent_color(), AccentColor::Blue.color());
    }

    #[test]
    fn color_hex_is_lowercase_and_padded() {
        assert_eq!(Color::new_rgb(1, 171, 255).to_hex(), "#01abff");
    }
}
