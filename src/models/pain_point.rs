use serde::{Deserialize, Serialize};

/// Error for unrecognised enum strings coming from snapshots or requests.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Invalid value for {field}: {value}")]
pub struct InvalidEnum {
    pub field: &'static str,
    pub value: String,
}

/// Macro to generate enum with as_str + std::str::FromStr pattern
macro_rules! str_enum {
    ($name:ident { $($variant:ident => $s:literal),+ $(,)? }) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(rename_all = "lowercase")]
        pub enum $name {
            $($variant),+
        }

        impl $name {
            pub fn as_str(&self) -> &'static str {
                match self {
                    $(Self::$variant => $s),+
                }
            }
        }

        impl std::str::FromStr for $name {
            type Err = InvalidEnum;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($s => Ok(Self::$variant)),+,
                    _ => Err(InvalidEnum {
                        field: stringify!($name),
                        value: s.into(),
                    }),
                }
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }
    };
}

str_enum!(BodyView {
    Front => "front",
    Back => "back",
});

str_enum!(IntensityLevel {
    Low => "low",
    Medium => "medium",
    High => "high",
});

impl BodyView {
    /// Capitalised label used in display names ("Front", "Back").
    pub fn label(&self) -> &'static str {
        match self {
            Self::Front => "Front",
            Self::Back => "Back",
        }
    }
}

impl IntensityLevel {
    /// Bucket a 0–10 rating: low ≤3, medium 4–7, high ≥8.
    pub fn from_intensity(intensity: u8) -> Self {
        match intensity {
            0..=3 => Self::Low,
            4..=7 => Self::Medium,
            _ => Self::High,
        }
    }
}

/// Click position relative to the diagram's rendered box, in percent.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RelativePosition {
    pub x_percent: f64,
    pub y_percent: f64,
}

impl RelativePosition {
    /// Clamp both axes into [0, 100].
    pub fn clamped(x_percent: f64, y_percent: f64) -> Self {
        Self {
            x_percent: x_percent.clamp(0.0, 100.0),
            y_percent: y_percent.clamp(0.0, 100.0),
        }
    }
}

/// A marked pain location on the body diagram.
///
/// Identity is `key` alone. `intensity_level` is always derived from
/// `intensity`; construct through [`PainPoint::new`] or
/// [`PainPoint::set_intensity`] so the two never disagree.
#[derive(Debug, Clone, PartialEq)]
pub struct PainPoint {
    pub key: String,
    pub view: BodyView,
    pub hotspot_id: String,
    /// Hotspot name as defined in the reference data (viewer's perspective).
    pub original_name: String,
    /// Patient-centric label after mirroring correction.
    pub region: String,
    pub position: RelativePosition,
    intensity: u8,
}

impl PainPoint {
    pub const MAX_INTENSITY: u8 = 10;

    pub fn new(
        view: BodyView,
        hotspot_id: &str,
        original_name: &str,
        region: &str,
        position: RelativePosition,
        intensity: u8,
    ) -> Self {
        Self {
            key: pain_point_key(view, hotspot_id, region),
            view,
            hotspot_id: hotspot_id.to_string(),
            original_name: original_name.to_string(),
            region: region.to_string(),
            position,
            intensity: intensity.min(Self::MAX_INTENSITY),
        }
    }

    pub fn intensity(&self) -> u8 {
        self.intensity
    }

    pub fn set_intensity(&mut self, intensity: u8) {
        self.intensity = intensity.min(Self::MAX_INTENSITY);
    }

    pub fn intensity_level(&self) -> IntensityLevel {
        IntensityLevel::from_intensity(self.intensity)
    }

    /// Label shown in the "selected areas" list, e.g. `Right Shoulder (Front)`.
    pub fn display_name(&self) -> String {
        format!("{} ({})", self.region, self.view.label())
    }
}

/// Composite identity of a pain point: `{view}:{hotspot_id}:{label}`.
pub fn pain_point_key(view: BodyView, hotspot_id: &str, region: &str) -> String {
    format!("{}:{}:{}", view.as_str(), hotspot_id, region)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn intensity_level_boundaries() {
        assert_eq!(IntensityLevel::from_intensity(0), IntensityLevel::Low);
        assert_eq!(IntensityLevel::from_intensity(3), IntensityLevel::Low);
        assert_eq!(IntensityLevel::from_intensity(4), IntensityLevel::Medium);
        assert_eq!(IntensityLevel::from_intensity(7), IntensityLevel::Medium);
        assert_eq!(IntensityLevel::from_intensity(8), IntensityLevel::High);
        assert_eq!(IntensityLevel::from_intensity(10), IntensityLevel::High);
    }

    #[test]
    fn view_round_trips_through_str() {
        for view in [BodyView::Front, BodyView::Back] {
            assert_eq!(view.as_str().parse::<BodyView>().unwrap(), view);
        }
        assert!("side".parse::<BodyView>().is_err());
    }

    #[test]
    fn view_serializes_lowercase() {
        assert_eq!(serde_json::to_string(&BodyView::Front).unwrap(), "\"front\"");
        assert_eq!(
            serde_json::to_string(&IntensityLevel::Medium).unwrap(),
            "\"medium\""
        );
    }

    #[test]
    fn key_combines_view_hotspot_and_label() {
        let point = PainPoint::new(
            BodyView::Front,
            "shoulder-l",
            "Left Shoulder",
            "Right Shoulder",
            RelativePosition::clamped(30.0, 20.0),
            7,
        );
        assert_eq!(point.key, "front:shoulder-l:Right Shoulder");
        assert_eq!(point.intensity_level(), IntensityLevel::Medium);
        assert_eq!(point.display_name(), "Right Shoulder (Front)");
    }

    #[test]
    fn intensity_is_capped_and_level_follows() {
        let mut point = PainPoint::new(
            BodyView::Back,
            "lower-back",
            "Lower Back",
            "Lower Back",
            RelativePosition::clamped(50.0, 60.0),
            42,
        );
        assert_eq!(point.intensity(), 10);
        point.set_intensity(2);
        assert_eq!(point.intensity_level(), IntensityLevel::Low);
    }

    #[test]
    fn position_is_clamped() {
        let pos = RelativePosition::clamped(-4.0, 104.5);
        assert_eq!(pos.x_percent, 0.0);
        assert_eq!(pos.y_percent, 100.0);
    }
}
