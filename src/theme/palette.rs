//! Accent color codes published by the settings provider.

use super::Color;

/// Cached index before the provider has reported an accent color.
pub const UNSET_ACCENT_INDEX: i32 = -1;

// Declares the accent enum together with its code and color table.
macro_rules! define_accents {
    ($($name:ident = $code:literal => ($r:literal, $g:literal, $b:literal)),* $(,)?) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        #[repr(i32)]
        pub enum AccentColor {
            $($name = $code),*
        }

        impl AccentColor {
            pub const ALL: &'static [AccentColor] = &[$(AccentColor::$name),*];

            /// Maps a provider code to a known accent, if any.
            pub fn from_code(code: i32) -> Option<Self> {
                match code {
                    $($code => Some(AccentColor::$name),)*
                    _ => None,
                }
            }

            pub const fn color(self) -> Color {
                match self {
                    $(AccentColor::$name => Color::new_rgb($r, $g, $b)),*
                }
            }
        }
    };
}

define_accents! {
    Blue = 0 => (51, 133, 255),
    Red = 1 => (237, 72, 95),
    Green = 2 => (41, 198, 121),
    Purple = 3 => (130, 102, 255),
    Pink = 4 => (202, 100, 172),
    Orange = 5 => (238, 114, 77),
    Grey = 6 => (68, 68, 68),
}

impl Default for AccentColor {
    fn default() -> Self {
        AccentColor::Blue
    }
}

/// Resolves any provider code to a color. Unknown codes fall back to blue.
pub fn accent_color_for(code: i32) -> Color {
    AccentColor::from_code(code).unwrap_or_default().color()
}
