/// A catalog category with its numeric code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Classification {
    pub name: &'static str,
    pub code: u32,
}

pub const KNOWN_CLASSIFICATIONS: [Classification; 10] = [
    Classification { name: "Paintings", code: 26 },
    Classification { name: "Sculpture", code: 30 },
    Classification { name: "Coins", code: 50 },
    Classification { name: "Jewelry", code: 19 },
    Classification { name: "Drawings", code: 21 },
    Classification { name: "Prints", code: 23 },
    Classification { name: "Photographs", code: 17 },
    Classification { name: "Manuscripts", code: 185 },
    Classification { name: "Vessels", code: 57 },
    Classification { name: "Furniture", code: 76 },
];

impl Classification {
    /// Case-insensitive lookup by name or numeric code.
    pub fn lookup(input: &str) -> Option<&'static Classification> {
        let needle = input.trim();
        if let Ok(code) = needle.parse::<u32>() {
            return KNOWN_CLASSIFICATIONS.iter().find(|c| c.code == code);
        }
        KNOWN_CLASSIFICATIONS
            .iter()
            .find(|c| c.name.eq_ignore_ascii_case(needle))
    }
}

/// Value to send as the catalog's `classification` filter. Known names are
/// canonicalized; anything else passes through untouched.
pub fn filter_value(input: &str) -> String {
    match Classification::lookup(input) {
        Some(c) if !input.trim().chars().all(|ch| ch.is_ascii_digit()) => c.name.to_string(),
        _ => input.trim().to_string(),
    }
}
