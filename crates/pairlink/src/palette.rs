//! Colors offered by the picker.

use pairlink_session::ColorPayload;

/// One picker button.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PaletteEntry {
    /// ASCII key for command lines.
    pub key: &'static str,
    /// Display name, sent as `colorName`.
    pub name: &'static str,
    pub rgb: (u8, u8, u8),
}

impl PaletteEntry {
    /// Opaque payload for this entry.
    pub fn payload(&self) -> ColorPayload {
        let (r, g, b) = self.rgb;
        ColorPayload::new(
            self.name,
            f64::from(r) / 255.0,
            f64::from(g) / 255.0,
            f64::from(b) / 255.0,
            1.0,
        )
    }
}

/// System colors in light appearance.
pub const PALETTE: [PaletteEntry; 8] = [
    PaletteEntry { key: "red", name: "紅色", rgb: (255, 59, 48) },
    PaletteEntry { key: "blue", name: "藍色", rgb: (0, 122, 255) },
    PaletteEntry { key: "green", name: "綠色", rgb: (52, 199, 89) },
    PaletteEntry { key: "orange", name: "橘色", rgb: (255, 149, 0) },
    PaletteEntry { key: "purple", name: "紫色", rgb: (175, 82, 222) },
    PaletteEntry { key: "pink", name: "粉紅色", rgb: (255, 45, 85) },
    PaletteEntry { key: "yellow", name: "黃色", rgb: (255, 204, 0) },
    PaletteEntry { key: "teal", name: "青色", rgb: (48, 176, 199) },
];

/// Find an entry by key (any case) or by exact display name.
pub fn lookup(query: &str) -> Option<&'static PaletteEntry> {
    let query = query.trim();
    PALETTE
        .iter()
        .find(|entry| entry.key.eq_ignore_ascii_case(query) || entry.name == query)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookup_by_key_or_name() {
        assert_eq!(lookup("RED").map(|e| e.name), Some("紅色"));
        assert_eq!(lookup("青色").map(|e| e.key), Some("teal"));
        assert!(lookup("magenta").is_none());
    }

    #[test]
    fn payload_channels_are_normalized() {
        let red = lookup("red").unwrap().payload();
        assert_eq!(red.name, "紅色");
        assert_eq!(red.red, 1.0);
        assert_eq!(red.alpha, 1.0);
        assert!(red.is_in_unit_range());
        assert_eq!(red.to_hex(), "#FF3B30FF");
    }

    #[test]
    fn keys_and_names_are_unique() {
        for (i, a) in PALETTE.iter().enumerate() {
            for b in &PALETTE[i + 1..] {
                assert_ne!(a.key, b.key);
                assert_ne!(a.name, b.name);
            }
        }
    }
}
