//! Hotspot reference data for the two body diagrams.
//!
//! Names are written from the viewer's perspective: on the front diagram the
//! "Left Shoulder" hotspot sits on the left of the image, which is the
//! patient's right. The registry corrects this when it resolves a click.

use serde::{Deserialize, Serialize};

use crate::models::BodyView;

/// A named region with a bounding box normalized to the image, all in [0, 1].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Hotspot {
    pub id: String,
    pub name: String,
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl Hotspot {
    /// Box center in a `width` x `height` pixel space.
    pub fn center_in(&self, width: f64, height: f64) -> (f64, f64) {
        (
            (self.x + self.width / 2.0) * width,
            (self.y + self.height / 2.0) * height,
        )
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HotspotCatalog {
    #[serde(default)]
    pub front: Vec<Hotspot>,
    #[serde(default)]
    pub back: Vec<Hotspot>,
}

impl HotspotCatalog {
    /// Load `{ "front": [...], "back": [...] }`.
    pub fn from_json(raw: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(raw)
    }

    pub fn for_view(&self, view: BodyView) -> &[Hotspot] {
        match view {
            BodyView::Front => &self.front,
            BodyView::Back => &self.back,
        }
    }

    pub fn find(&self, view: BodyView, id: &str) -> Option<&Hotspot> {
        self.for_view(view).iter().find(|h| h.id == id)
    }

    /// The catalog shipped with the wizard's diagrams.
    pub fn builtin() -> Self {
        Self {
            front: to_hotspots(FRONT),
            back: to_hotspots(BACK),
        }
    }
}

type Row = (&'static str, &'static str, f64, f64, f64, f64);

fn to_hotspots(rows: &[Row]) -> Vec<Hotspot> {
    rows.iter()
        .map(|&(id, name, x, y, width, height)| Hotspot {
            id: id.to_string(),
            name: name.to_string(),
            x,
            y,
            width,
            height,
        })
        .collect()
}

const FRONT: &[Row] = &[
    ("head", "Head", 0.42, 0.02, 0.16, 0.10),
    ("neck", "Neck", 0.45, 0.12, 0.10, 0.04),
    ("shoulder-l", "Left Shoulder", 0.26, 0.16, 0.13, 0.07),
    ("shoulder-r", "Right Shoulder", 0.61, 0.16, 0.13, 0.07),
    ("chest", "Chest", 0.39, 0.18, 0.22, 0.12),
    ("abdomen", "Abdomen", 0.39, 0.31, 0.22, 0.12),
    ("arm-l", "Left Arm", 0.20, 0.24, 0.10, 0.18),
    ("arm-r", "Right Arm", 0.70, 0.24, 0.10, 0.18),
    ("hand-l", "Left Hand", 0.14, 0.43, 0.10, 0.08),
    ("hand-r", "Right Hand", 0.76, 0.43, 0.10, 0.08),
    ("hip-l", "Left Hip", 0.36, 0.44, 0.13, 0.08),
    ("hip-r", "Right Hip", 0.51, 0.44, 0.13, 0.08),
    ("thigh-l", "Left Thigh", 0.36, 0.53, 0.12, 0.13),
    ("thigh-r", "Right Thigh", 0.52, 0.53, 0.12, 0.13),
    ("knee-l", "Left Knee", 0.37, 0.66, 0.10, 0.07),
    ("knee-r", "Right Knee", 0.53, 0.66, 0.10, 0.07),
    ("shin-l", "Left Shin", 0.37, 0.74, 0.10, 0.14),
    ("shin-r", "Right Shin", 0.53, 0.74, 0.10, 0.14),
    ("foot-l", "Left Foot", 0.35, 0.89, 0.12, 0.07),
    ("foot-r", "Right Foot", 0.53, 0.89, 0.12, 0.07),
];

const BACK: &[Row] = &[
    ("head-back", "Back of Head", 0.42, 0.02, 0.16, 0.10),
    ("neck-back", "Neck", 0.45, 0.12, 0.10, 0.04),
    ("shoulder-blade-l", "Left Shoulder Blade", 0.28, 0.17, 0.14, 0.09),
    ("shoulder-blade-r", "Right Shoulder Blade", 0.58, 0.17, 0.14, 0.09),
    ("upper-back", "Upper Back", 0.42, 0.17, 0.16, 0.09),
    ("mid-back", "Mid Back", 0.39, 0.27, 0.22, 0.08),
    ("lower-back", "Lower Back", 0.39, 0.35, 0.22, 0.08),
    ("elbow-l", "Left Elbow", 0.20, 0.30, 0.09, 0.07),
    ("elbow-r", "Right Elbow", 0.71, 0.30, 0.09, 0.07),
    ("buttock-l", "Left Buttock", 0.37, 0.44, 0.12, 0.08),
    ("buttock-r", "Right Buttock", 0.51, 0.44, 0.12, 0.08),
    ("hamstring-l", "Left Hamstring", 0.36, 0.53, 0.12, 0.13),
    ("hamstring-r", "Right Hamstring", 0.52, 0.53, 0.12, 0.13),
    ("calf-l", "Left Calf", 0.37, 0.70, 0.10, 0.15),
    ("calf-r", "Right Calf", 0.53, 0.70, 0.10, 0.15),
    ("heel-l", "Left Heel", 0.37, 0.90, 0.10, 0.05),
    ("heel-r", "Right Heel", 0.53, 0.90, 0.10, 0.05),
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_boxes_are_normalized_and_ids_unique() {
        let catalog = HotspotCatalog::builtin();
        for view in [BodyView::Front, BodyView::Back] {
            let spots = catalog.for_view(view);
            assert!(!spots.is_empty());
            let mut ids: Vec<&str> = spots.iter().map(|h| h.id.as_str()).collect();
            ids.sort_unstable();
            ids.dedup();
            assert_eq!(ids.len(), spots.len(), "duplicate id in {view}");
            for h in spots {
                assert!(h.x >= 0.0 && h.x + h.width <= 1.0, "{} x out of range", h.id);
                assert!(h.y >= 0.0 && h.y + h.height <= 1.0, "{} y out of range", h.id);
            }
        }
    }

    #[test]
    fn front_left_shoulder_is_on_image_left() {
        let catalog = HotspotCatalog::builtin();
        let h = catalog.find(BodyView::Front, "shoulder-l").unwrap();
        assert_eq!(h.name, "Left Shoulder");
        let (cx, _) = h.center_in(1.0, 1.0);
        assert!(cx < 0.5);
    }

    #[test]
    fn center_scales_with_pixel_space() {
        let h = Hotspot {
            id: "x".into(),
            name: "X".into(),
            x: 0.2,
            y: 0.4,
            width: 0.2,
            height: 0.2,
        };
        let (cx, cy) = h.center_in(200.0, 500.0);
        assert!((cx - 60.0).abs() < 1e-9);
        assert!((cy - 250.0).abs() < 1e-9);
    }

    #[test]
    fn loads_external_catalog() {
        let catalog = HotspotCatalog::from_json(
            r#"{"front":[{"id":"a","name":"Left Knee","x":0.1,"y":0.1,"width":0.1,"height":0.1}]}"#,
        )
        .unwrap();
        assert_eq!(catalog.front.len(), 1);
        assert!(catalog.back.is_empty());
    }
}
