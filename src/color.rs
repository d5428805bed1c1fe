use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// 8-bit RGB color. Serialized as a `#rrggbb` hex string.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Rgb {
    pub const WHITE: Rgb = Rgb::new(0xff, 0xff, 0xff);
    pub const BLACK: Rgb = Rgb::new(0x00, 0x00, 0x00);

    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    pub const fn from_u32(value: u32) -> Self {
        Self::new(
            ((value >> 16) & 0xff) as u8,
            ((value >> 8) & 0xff) as u8,
            (value & 0xff) as u8,
        )
    }

    pub fn to_f32(self) -> [f32; 3] {
        [
            f32::from(self.r) / 255.0,
            f32::from(self.g) / 255.0,
            f32::from(self.b) / 255.0,
        ]
    }

    pub fn from_f32(rgb: [f32; 3]) -> Self {
        let channel = |value: f32| (value.clamp(0.0, 1.0) * 255.0).round() as u8;
        Self::new(channel(rgb[0]), channel(rgb[1]), channel(rgb[2]))
    }

    pub fn to_hex(self) -> String {
        format!("#{:02x}{:02x}{:02x}", self.r, self.g, self.b)
    }
}

impl fmt::Display for Rgb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid color '{0}': expected #rrggbb")]
pub struct ParseColorError(String);

impl FromStr for Rgb {
    type Err = ParseColorError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let trimmed = value.trim();
        let hex = trimmed
            .strip_prefix('#')
            .or_else(|| trimmed.strip_prefix("0x"))
            .unwrap_or(trimmed);
        if !hex.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(ParseColorError(value.to_string()));
        }
        let expanded: String = match hex.len() {
            3 => hex.chars().flat_map(|c| [c, c]).collect(),
            6 => hex.to_string(),
            _ => return Err(ParseColorError(value.to_string())),
        };
        u32::from_str_radix(&expanded, 16)
            .map(Rgb::from_u32)
            .map_err(|_| ParseColorError(value.to_string()))
    }
}

impl Serialize for Rgb {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for Rgb {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum RawColor {
            Hex(String),
            Packed(u32),
            Float([f32; 3]),
        }

        match RawColor::deserialize(deserializer)? {
            RawColor::Hex(text) => text.parse().map_err(serde::de::Error::custom),
            RawColor::Packed(value) => Ok(Rgb::from_u32(value)),
            RawColor::Float(rgb) => Ok(Rgb::from_f32(rgb)),
        }
    }
}

/// Semantic color slot a material rule maps a part onto.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColorRole {
    Primary,
    Secondary,
    Accent,
}

impl fmt::Display for ColorRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ColorRole::Primary => "primary",
            ColorRole::Secondary => "secondary",
            ColorRole::Accent => "accent",
        };
        f.pad(name)
    }
}

/// The three colors a customer picks for a shoe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Colors {
    pub primary: Rgb,
    pub secondary: Rgb,
    pub accent: Rgb,
}

impl Colors {
    pub fn new(primary: Rgb, secondary: Rgb, accent: Rgb) -> Self {
        Self {
            primary,
            secondary,
            accent,
        }
    }

    pub fn get(&self, role: ColorRole) -> Rgb {
        match role {
            ColorRole::Primary => self.primary,
            ColorRole::Secondary => self.secondary,
            ColorRole::Accent => self.accent,
        }
    }
}

impl Default for Colors {
    fn default() -> Self {
        Self {
            primary: Rgb::WHITE,
            secondary: Rgb::from_u32(0x1f1f1f),
            accent: Rgb::from_u32(0xd62828),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{ColorRole, Colors, Rgb};

    #[test]
    fn parses_hex_forms() {
        assert_eq!("#ff8000".parse::<Rgb>().unwrap(), Rgb::new(255, 128, 0));
        assert_eq!("ff8000".parse::<Rgb>().unwrap(), Rgb::new(255, 128, 0));
        assert_eq!("#f80".parse::<Rgb>().unwrap(), Rgb::new(255, 136, 0));
        assert!("#ff80".parse::<Rgb>().is_err());
        assert!("#gg0000".parse::<Rgb>().is_err());
    }

    #[test]
    fn sign_prefixed_hex_is_rejected() {
        assert!("+fffff".parse::<Rgb>().is_err());
        assert!("#+ff".parse::<Rgb>().is_err());
        assert!("-00000".parse::<Rgb>().is_err());
    }

    #[test]
    fn deserializes_string_number_and_float_forms() {
        let hex: Rgb = serde_json::from_str("\"#00ff00\"").unwrap();
        let packed: Rgb = serde_json::from_str("16711680").unwrap();
        let float: Rgb = serde_json::from_str("[0.0, 0.0, 1.0]").unwrap();
        assert_eq!(hex, Rgb::new(0, 255, 0));
        assert_eq!(packed, Rgb::new(255, 0, 0));
        assert_eq!(float, Rgb::new(0, 0, 255));
        assert_eq!(serde_json::to_string(&hex).unwrap(), "\"#00ff00\"");
    }

    #[test]
    fn colors_lookup_by_role() {
        let colors = Colors::new(Rgb::new(1, 0, 0), Rgb::new(0, 2, 0), Rgb::new(0, 0, 3));
        assert_eq!(colors.get(ColorRole::Primary), Rgb::new(1, 0, 0));
        assert_eq!(colors.get(ColorRole::Secondary), Rgb::new(0, 2, 0));
        assert_eq!(colors.get(ColorRole::Accent), Rgb::new(0, 0, 3));
    }
}
