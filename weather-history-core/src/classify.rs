//! Weather label canonicalization and extreme-weather detection.
//!
//! The synonym table here is the only mapping from provider labels to
//! catalog categories; both the fetcher and the relational ingester go
//! through [`canonical_label`].

use std::fmt;

/// Canonical weather categories, in catalog order. The discriminant is the
/// category's stable id in the `Weather_Type` table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum WeatherCategory {
    Sunny = 0,
    Rainy = 1,
    Snowy = 2,
    Windy = 3,
    Tornado = 4,
    Blizzard = 5,
    Cloudy = 6,
    Foggy = 7,
    Clear = 8,
}

impl WeatherCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            WeatherCategory::Sunny => "Sunny",
            WeatherCategory::Rainy => "Rainy",
            WeatherCategory::Snowy => "Snowy",
            WeatherCategory::Windy => "Windy",
            WeatherCategory::Tornado => "Tornado",
            WeatherCategory::Blizzard => "Blizzard",
            WeatherCategory::Cloudy => "Cloudy",
            WeatherCategory::Foggy => "Foggy",
            WeatherCategory::Clear => "Clear",
        }
    }

    pub fn id(&self) -> i64 {
        *self as i64
    }

    pub const fn all() -> &'static [WeatherCategory] {
        &[
            WeatherCategory::Sunny,
            WeatherCategory::Rainy,
            WeatherCategory::Snowy,
            WeatherCategory::Windy,
            WeatherCategory::Tornado,
            WeatherCategory::Blizzard,
            WeatherCategory::Cloudy,
            WeatherCategory::Foggy,
            WeatherCategory::Clear,
        ]
    }
}

impl fmt::Display for WeatherCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl TryFrom<&str> for WeatherCategory {
    type Error = UnknownCategory;

    /// Case-insensitive exact match on the category title.
    fn try_from(value: &str) -> Result<Self, Self::Error> {
        WeatherCategory::all()
            .iter()
            .copied()
            .find(|c| c.as_str().eq_ignore_ascii_case(value))
            .ok_or_else(|| UnknownCategory(value.to_string()))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Unknown weather category '{0}'")]
pub struct UnknownCategory(pub String);

/// Lower-cased provider label → catalog title.
pub const LABEL_SYNONYMS: &[(&str, &str)] = &[
    ("clear", "Sunny"),
    ("clouds", "Cloudy"),
    ("rain", "Rainy"),
    ("snow", "Snowy"),
    ("mist", "Foggy"),
    ("haze", "Foggy"),
    ("fog", "Foggy"),
    ("thunderstorm", "Blizzard"),
    ("drizzle", "Rainy"),
    ("wind", "Windy"),
];

/// Raw labels that mark an observation as extreme regardless of readings.
pub const EXTREME_LABELS: &[&str] = &["thunderstorm", "blizzard", "tornado"];

pub const EXTREME_HEAT_C: f64 = 35.0;
pub const EXTREME_COLD_C: f64 = -5.0;
pub const EXTREME_HUMIDITY_PCT: f64 = 95.0;
pub const EXTREME_WIND_SPEED: f64 = 30.0;

/// Map a raw label through [`LABEL_SYNONYMS`]; unknown labels pass through as-is.
pub fn canonical_label(raw: &str) -> &str {
    let lower = raw.to_lowercase();
    LABEL_SYNONYMS
        .iter()
        .find(|(synonym, _)| *synonym == lower)
        .map(|(_, title)| *title)
        .unwrap_or(raw)
}

/// Resolve a raw label to a catalog category, if it names one after mapping.
pub fn resolve_category(raw: &str) -> Option<WeatherCategory> {
    WeatherCategory::try_from(canonical_label(raw)).ok()
}

/// Metric readings; `wind_speed` is in the provider's units (m/s).
pub fn is_extreme(raw_label: &str, temperature: f64, humidity: f64, wind_speed: f64) -> bool {
    let label = raw_label.to_lowercase();

    temperature > EXTREME_HEAT_C
        || temperature < EXTREME_COLD_C
        || humidity > EXTREME_HUMIDITY_PCT
        || wind_speed > EXTREME_WIND_SPEED
        || EXTREME_LABELS.contains(&label.as_str())
}

#[derive(Debug, Clone, PartialEq)]
pub struct Classification {
    /// Label after synonym mapping (may be an unknown pass-through).
    pub label: String,
    pub category: Option<WeatherCategory>,
    pub is_extreme: bool,
}

pub fn classify(raw_label: &str, temperature: f64, humidity: f64, wind_speed: f64) -> Classification {
    let label = canonical_label(raw_label);

    Classification {
        label: label.to_string(),
        category: WeatherCategory::try_from(label).ok(),
        is_extreme: is_extreme(raw_label, temperature, humidity, wind_speed),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn category_ids_are_stable() {
        let ids: Vec<i64> = WeatherCategory::all().iter().map(|c| c.id()).collect();
        assert_eq!(ids, (0..9).collect::<Vec<_>>());
        assert_eq!(WeatherCategory::Clear.id(), 8);
        assert_eq!(WeatherCategory::Sunny.id(), 0);
    }

    #[test]
    fn category_as_str_roundtrip() {
        for c in WeatherCategory::all() {
            let parsed = WeatherCategory::try_from(c.as_str()).expect("roundtrip should succeed");
            assert_eq!(*c, parsed);
            assert_eq!(WeatherCategory::try_from(c.as_str().to_uppercase().as_str()), Ok(*c));
        }
    }

    #[test]
    fn synonyms_map_to_catalog_titles() {
        assert_eq!(canonical_label("Clear"), "Sunny");
        assert_eq!(canonical_label("Thunderstorm"), "Blizzard");
        assert_eq!(canonical_label("haze"), "Foggy");
        assert_eq!(canonical_label("Drizzle"), "Rainy");
        assert_eq!(canonical_label("wind"), "Windy");

        for (_, title) in LABEL_SYNONYMS {
            assert!(WeatherCategory::try_from(*title).is_ok(), "{title} missing from catalog");
        }
    }

    #[test]
    fn unknown_labels_pass_through() {
        assert_eq!(canonical_label("Plasma-Storm"), "Plasma-Storm");
        assert_eq!(resolve_category("plasma-storm"), None);
        assert_eq!(resolve_category("Tornado"), Some(WeatherCategory::Tornado));
        assert_eq!(resolve_category("drizzle"), Some(WeatherCategory::Rainy));
    }

    #[test]
    fn hot_reading_is_extreme() {
        assert!(is_extreme("clear", 36.0, 50.0, 5.0));
        assert!(is_extreme("clear", -6.0, 50.0, 5.0));
        assert!(is_extreme("clear", 10.0, 96.0, 5.0));
        assert!(is_extreme("clear", 10.0, 50.0, 31.0));
    }

    #[test]
    fn mild_clear_reading_is_not_extreme() {
        let c = classify("clear", 10.0, 50.0, 5.0);
        assert!(!c.is_extreme);
        assert_eq!(c.category, Some(WeatherCategory::Sunny));
    }

    #[test]
    fn thresholds_are_exclusive() {
        assert!(!is_extreme("rain", 35.0, 95.0, 30.0));
        assert!(!is_extreme("rain", -5.0, 0.0, 0.0));
    }

    #[test]
    fn severe_label_is_extreme_with_mild_readings() {
        let c = classify("Tornado", 18.0, 40.0, 3.0);
        assert!(c.is_extreme);
        assert_eq!(c.category, Some(WeatherCategory::Tornado));

        // Extreme check uses the raw label, before mapping to Blizzard.
        assert!(classify("thunderstorm", 18.0, 40.0, 3.0).is_extreme);
    }
}
