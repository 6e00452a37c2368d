//! Light/dark palettes and basemap tiles

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Accent for the current point
pub const CURRENT_COLOR: &str = "#ff6b6b";

const TILE_HOSTS: [&str; 4] = ["a", "b", "c", "d"];

/// Display theme
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Theme {
    #[default]
    Light,
    Dark,
}

impl Theme {
    pub fn toggled(self) -> Self {
        match self {
            Theme::Light => Theme::Dark,
            Theme::Dark => Theme::Light,
        }
    }

    pub fn is_dark(self) -> bool {
        self == Theme::Dark
    }

    /// Route line color
    pub fn path_color(self) -> &'static str {
        match self {
            Theme::Light => "#000000",
            Theme::Dark => "#ffffff",
        }
    }

    /// Fill of the selected marker
    pub fn selected_color(self) -> &'static str {
        self.path_color()
    }

    /// Fill of markers that are neither current nor selected
    pub fn marker_color(self) -> &'static str {
        match self {
            Theme::Light => "#666666",
            Theme::Dark => "#cccccc",
        }
    }

    /// Marker outline, contrasting the basemap
    pub fn stroke_color(self) -> &'static str {
        match self {
            Theme::Light => "#ffffff",
            Theme::Dark => "#000000",
        }
    }

    /// CARTO raster tile URLs for this theme
    pub fn basemap_tiles(self) -> Vec<String> {
        let style = match self {
            Theme::Light => "light_all",
            Theme::Dark => "dark_all",
        };
        TILE_HOSTS
            .iter()
            .map(|host| format!("https://{}.basemaps.cartocdn.com/{}/{{z}}/{{x}}/{{y}}.png", host, style))
            .collect()
    }
}

impl fmt::Display for Theme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Theme::Light => f.write_str("light"),
            Theme::Dark => f.write_str("dark"),
        }
    }
}

impl FromStr for Theme {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "light" => Ok(Theme::Light),
            "dark" => Ok(Theme::Dark),
            other => Err(format!("unknown theme: {}", other)),
        }
    }
}
