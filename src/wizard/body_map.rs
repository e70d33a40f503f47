//! Pain-point registry: turns body-diagram clicks into named pain points.
//!
//! Resolution runs in the diagram's *rendered* box. A click is first checked
//! against the box, then (when a raster of the diagram is loaded) against the
//! image's alpha channel, then assigned to the hotspot whose center is
//! nearest. Front-view labels are mirrored to the patient's own left/right.
//! A click on an existing point removes it; a click on a new spot waits for
//! an intensity before anything is inserted.

use std::collections::HashMap;

use image::RgbaImage;
use serde::Serialize;

use super::hotspots::{Hotspot, HotspotCatalog};
use super::state::WizardState;
use crate::config::{ALPHA_MISS_THRESHOLD, DEFAULT_PAIN_INTENSITY};
use crate::models::{pain_point_key, BodyView, IntensityLevel, PainPoint, RelativePosition};

#[derive(Debug, thiserror::Error)]
pub enum BodyMapError {
    #[error("No hotspots defined for the {0} view")]
    NoHotspots(BodyView),

    #[error("No pain point is waiting for confirmation")]
    NothingPending,

    #[error("Rendered diagram box has no area")]
    EmptyBox,

    #[error("Diagram image could not be decoded: {0}")]
    Image(#[from] image::ImageError),
}

/// The diagram's on-screen box, in the same pixel space as clicks.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RenderedBox {
    pub left: f64,
    pub top: f64,
    pub width: f64,
    pub height: f64,
}

impl RenderedBox {
    pub fn new(left: f64, top: f64, width: f64, height: f64) -> Self {
        Self {
            left,
            top,
            width,
            height,
        }
    }

    fn contains(&self, x: f64, y: f64) -> bool {
        x >= self.left
            && x <= self.left + self.width
            && y >= self.top
            && y <= self.top + self.height
    }
}

// ═══════════════════════════════════════════════════════════
// Alpha mask
// ═══════════════════════════════════════════════════════════

/// Off-screen raster copy of a diagram, used only for transparency tests.
#[derive(Debug, Clone)]
pub struct AlphaMask {
    image: RgbaImage,
}

impl AlphaMask {
    pub fn from_image(image: RgbaImage) -> Self {
        Self { image }
    }

    pub fn from_png_bytes(bytes: &[u8]) -> Result<Self, BodyMapError> {
        let decoded = image::load_from_memory(bytes)?;
        Ok(Self {
            image: decoded.to_rgba8(),
        })
    }

    /// Alpha at a point given as a fraction of the image, each in [0, 1].
    /// Maps to the image's native pixels, independent of the rendered size.
    pub fn alpha_at(&self, fx: f64, fy: f64) -> Option<u8> {
        let (w, h) = self.image.dimensions();
        if w == 0 || h == 0 {
            return None;
        }
        let px = ((fx.clamp(0.0, 1.0) * f64::from(w)).floor() as u32).min(w - 1);
        let py = ((fy.clamp(0.0, 1.0) * f64::from(h)).floor() as u32).min(h - 1);
        Some(self.image.get_pixel(px, py).0[3])
    }
}

// ═══════════════════════════════════════════════════════════
// Click resolution
// ═══════════════════════════════════════════════════════════

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MissReason {
    OutsideDiagram,
    TransparentPixel,
}

/// A click mapped to a hotspot, label already corrected.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedClick {
    pub view: BodyView,
    pub hotspot_id: String,
    pub original_name: String,
    pub region: String,
    pub key: String,
    pub position: RelativePosition,
}

/// A new pain location waiting for the intensity choice.
pub type PendingPainPoint = ResolvedClick;

#[derive(Debug, Clone, PartialEq)]
pub enum ClickOutcome {
    /// Nothing happened.
    Ignored(MissReason),
    /// The click hit an existing point and removed it.
    Removed(PainPoint),
    /// A new point awaits `confirm_pending`.
    Pending(PendingPainPoint),
}

/// Swap whole-word Left/Right. Applied to front-view labels, whose hotspot
/// names are written from the viewer's side.
pub fn mirror_label(name: &str) -> String {
    name.split(' ')
        .map(|word| match word {
            "Left" => "Right",
            "Right" => "Left",
            "left" => "right",
            "right" => "left",
            other => other,
        })
        .collect::<Vec<_>>()
        .join(" ")
}

pub fn corrected_label(view: BodyView, name: &str) -> String {
    match view {
        BodyView::Front => mirror_label(name),
        BodyView::Back => name.to_string(),
    }
}

/// Nearest hotspot center to `(x, y)`, all in `width` x `height` pixel space.
pub fn nearest_hotspot(spots: &[Hotspot], x: f64, y: f64, width: f64, height: f64) -> Option<&Hotspot> {
    spots
        .iter()
        .map(|h| {
            let (cx, cy) = h.center_in(width, height);
            (h, (cx - x).hypot(cy - y))
        })
        .min_by(|a, b| a.1.total_cmp(&b.1))
        .map(|(h, _)| h)
}

/// A marker to draw over the diagram, positioned by percentages.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Marker {
    pub key: String,
    pub view: BodyView,
    pub left_percent: f64,
    pub top_percent: f64,
    pub intensity: u8,
    pub intensity_level: IntensityLevel,
    pub label: String,
}

impl From<&PainPoint> for Marker {
    fn from(point: &PainPoint) -> Self {
        Self {
            key: point.key.clone(),
            view: point.view,
            left_percent: point.position.x_percent,
            top_percent: point.position.y_percent,
            intensity: point.intensity(),
            intensity_level: point.intensity_level(),
            label: format!("{} - {}/10", point.region, point.intensity()),
        }
    }
}

// ═══════════════════════════════════════════════════════════
// Registry
// ═══════════════════════════════════════════════════════════

pub struct PainPointRegistry {
    catalog: HotspotCatalog,
    masks: HashMap<BodyView, AlphaMask>,
    pending: Option<PendingPainPoint>,
}

impl PainPointRegistry {
    pub fn new(catalog: HotspotCatalog) -> Self {
        Self {
            catalog,
            masks: HashMap::new(),
            pending: None,
        }
    }

    /// Enable the transparency test for one view.
    pub fn set_mask(&mut self, view: BodyView, mask: AlphaMask) {
        self.masks.insert(view, mask);
    }

    pub fn catalog(&self) -> &HotspotCatalog {
        &self.catalog
    }

    pub fn pending(&self) -> Option<&PendingPainPoint> {
        self.pending.as_ref()
    }

    /// Map a click to a hotspot without touching any state.
    /// `Ok(Err(reason))` is a silent miss; `Err` is a diagnostic failure.
    pub fn resolve(
        &self,
        view: BodyView,
        rendered: RenderedBox,
        click_x: f64,
        click_y: f64,
    ) -> Result<Result<ResolvedClick, MissReason>, BodyMapError> {
        if rendered.width <= 0.0 || rendered.height <= 0.0 {
            return Err(BodyMapError::EmptyBox);
        }
        if !rendered.contains(click_x, click_y) {
            return Ok(Err(MissReason::OutsideDiagram));
        }

        let local_x = click_x - rendered.left;
        let local_y = click_y - rendered.top;
        let fx = local_x / rendered.width;
        let fy = local_y / rendered.height;

        if let Some(alpha) = self.masks.get(&view).and_then(|m| m.alpha_at(fx, fy)) {
            if alpha < ALPHA_MISS_THRESHOLD {
                return Ok(Err(MissReason::TransparentPixel));
            }
        }

        let spots = self.catalog.for_view(view);
        let hotspot = nearest_hotspot(spots, local_x, local_y, rendered.width, rendered.height)
            .ok_or_else(|| {
                tracing::warn!(view = %view, "Body map click with no hotspots loaded");
                BodyMapError::NoHotspots(view)
            })?;

        let region = corrected_label(view, &hotspot.name);
        Ok(Ok(ResolvedClick {
            view,
            key: pain_point_key(view, &hotspot.id, &region),
            hotspot_id: hotspot.id.clone(),
            original_name: hotspot.name.clone(),
            region,
            position: RelativePosition::clamped(fx * 100.0, fy * 100.0),
        }))
    }

    /// Handle a diagram click: toggle off an existing point, or hold a new
    /// one pending an intensity. A new click replaces an older pending one.
    pub fn click(
        &mut self,
        state: &mut WizardState,
        view: BodyView,
        rendered: RenderedBox,
        click_x: f64,
        click_y: f64,
    ) -> Result<ClickOutcome, BodyMapError> {
        let resolved = match self.resolve(view, rendered, click_x, click_y)? {
            Ok(resolved) => resolved,
            Err(reason) => return Ok(ClickOutcome::Ignored(reason)),
        };

        if let Some(removed) = state.pain_points.remove(&resolved.key) {
            self.pending = None;
            tracing::debug!(key = %removed.key, "Pain point toggled off");
            return Ok(ClickOutcome::Removed(removed));
        }

        self.pending = Some(resolved.clone());
        Ok(ClickOutcome::Pending(resolved))
    }

    /// Insert the pending point with the chosen intensity (default midpoint).
    pub fn confirm_pending(
        &mut self,
        state: &mut WizardState,
        intensity: Option<u8>,
    ) -> Result<PainPoint, BodyMapError> {
        let pending = self.pending.take().ok_or(BodyMapError::NothingPending)?;
        let point = PainPoint::new(
            pending.view,
            &pending.hotspot_id,
            &pending.original_name,
            &pending.region,
            pending.position,
            intensity.unwrap_or(DEFAULT_PAIN_INTENSITY),
        );
        state.pain_points.insert(point.clone());
        tracing::debug!(key = %point.key, level = %point.intensity_level(), "Pain point added");
        Ok(point)
    }

    /// Drop the pending point (modal dismissed).
    pub fn cancel_pending(&mut self) -> bool {
        self.pending.take().is_some()
    }

    /// Remove by key (marker click or an explicit "remove" action).
    pub fn remove(&mut self, state: &mut WizardState, key: &str) -> Option<PainPoint> {
        if self.pending.as_ref().is_some_and(|p| p.key == key) {
            self.pending = None;
        }
        state.pain_points.remove(key)
    }

    /// Forget everything transient (start over, submission).
    pub fn reset(&mut self) {
        self.pending = None;
    }

    /// Markers for one view, rebuilt from persisted percentages.
    pub fn markers(state: &WizardState, view: BodyView) -> Vec<Marker> {
        state
            .pain_points
            .iter()
            .filter(|p| p.view == view)
            .map(Marker::from)
            .collect()
    }
}

impl Default for PainPointRegistry {
    fn default() -> Self {
        Self::new(HotspotCatalog::builtin())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;

    const BOX: RenderedBox = RenderedBox {
        left: 100.0,
        top: 50.0,
        width: 400.0,
        height: 800.0,
    };

    /// Click at the center of a hotspot, in page coordinates.
    fn click_on(registry: &PainPointRegistry, view: BodyView, id: &str) -> (f64, f64) {
        let h = registry.catalog().find(view, id).unwrap();
        let (cx, cy) = h.center_in(BOX.width, BOX.height);
        (BOX.left + cx, BOX.top + cy)
    }

    #[test]
    fn mirror_swaps_whole_words_only() {
        assert_eq!(mirror_label("Left Shoulder"), "Right Shoulder");
        assert_eq!(mirror_label("Right Knee"), "Left Knee");
        assert_eq!(mirror_label("Leftover Chest"), "Leftover Chest");
        assert_eq!(mirror_label("Neck"), "Neck");
    }

    #[test]
    fn back_labels_are_not_mirrored() {
        assert_eq!(corrected_label(BodyView::Back, "Left Calf"), "Left Calf");
        assert_eq!(corrected_label(BodyView::Front, "Left Calf"), "Right Calf");
    }

    #[test]
    fn front_shoulder_click_with_intensity_seven() {
        let mut registry = PainPointRegistry::default();
        let mut state = WizardState::new();
        let (x, y) = click_on(&registry, BodyView::Front, "shoulder-l");

        let outcome = registry.click(&mut state, BodyView::Front, BOX, x, y).unwrap();
        assert!(matches!(outcome, ClickOutcome::Pending(_)));
        assert!(state.pain_points.is_empty(), "nothing inserted before confirmation");

        let point = registry.confirm_pending(&mut state, Some(7)).unwrap();
        assert_eq!(point.view, BodyView::Front);
        assert_eq!(point.region, "Right Shoulder");
        assert_eq!(point.original_name, "Left Shoulder");
        assert_eq!(point.intensity(), 7);
        assert_eq!(point.intensity_level(), IntensityLevel::Medium);
        assert_eq!(point.key, "front:shoulder-l:Right Shoulder");
        assert_eq!(state.pain_points.len(), 1);
    }

    #[test]
    fn second_click_on_same_spot_toggles_off() {
        let mut registry = PainPointRegistry::default();
        let mut state = WizardState::new();
        let before = state.pain_points.clone();
        let (x, y) = click_on(&registry, BodyView::Back, "lower-back");

        registry.click(&mut state, BodyView::Back, BOX, x, y).unwrap();
        registry.confirm_pending(&mut state, None).unwrap();
        assert_eq!(state.pain_points.iter().next().unwrap().intensity(), 5);

        let outcome = registry.click(&mut state, BodyView::Back, BOX, x + 1.0, y).unwrap();
        assert!(matches!(outcome, ClickOutcome::Removed(ref p) if p.region == "Lower Back"));
        assert_eq!(state.pain_points, before);
    }

    #[test]
    fn outside_box_is_ignored() {
        let mut registry = PainPointRegistry::default();
        let mut state = WizardState::new();
        let outcome = registry.click(&mut state, BodyView::Front, BOX, 10.0, 10.0).unwrap();
        assert_eq!(outcome, ClickOutcome::Ignored(MissReason::OutsideDiagram));
        assert!(registry.pending().is_none());
    }

    #[test]
    fn transparent_pixel_is_ignored() {
        let mut registry = PainPointRegistry::default();
        // Left half transparent, right half opaque.
        let mut img = RgbaImage::from_pixel(10, 20, Rgba([0, 0, 0, 0]));
        for x in 5..10 {
            for y in 0..20 {
                img.put_pixel(x, y, Rgba([200, 180, 170, 255]));
            }
        }
        registry.set_mask(BodyView::Front, AlphaMask::from_image(img));
        let mut state = WizardState::new();

        let miss = registry
            .click(&mut state, BodyView::Front, BOX, BOX.left + 50.0, BOX.top + 400.0)
            .unwrap();
        assert_eq!(miss, ClickOutcome::Ignored(MissReason::TransparentPixel));

        let hit = registry
            .click(&mut state, BodyView::Front, BOX, BOX.left + 350.0, BOX.top + 400.0)
            .unwrap();
        assert!(matches!(hit, ClickOutcome::Pending(_)));
    }

    #[test]
    fn mask_decodes_png_bytes() {
        let img = RgbaImage::from_pixel(4, 4, Rgba([1, 2, 3, 4]));
        let mut bytes = Vec::new();
        image::DynamicImage::ImageRgba8(img)
            .write_to(&mut bytes, image::ImageOutputFormat::Png)
            .unwrap();
        let mask = AlphaMask::from_png_bytes(&bytes).unwrap();
        assert_eq!(mask.alpha_at(0.5, 0.5), Some(4));
        assert!(AlphaMask::from_png_bytes(b"not a png").is_err());
    }

    #[test]
    fn nearest_center_wins_even_outside_its_box() {
        let spots = vec![
            Hotspot {
                id: "a".into(),
                name: "A".into(),
                x: 0.0,
                y: 0.0,
                width: 0.1,
                height: 0.1,
            },
            Hotspot {
                id: "b".into(),
                name: "B".into(),
                x: 0.8,
                y: 0.8,
                width: 0.2,
                height: 0.2,
            },
        ];
        // Inside neither box, closer to A's center.
        let hit = nearest_hotspot(&spots, 30.0, 30.0, 100.0, 100.0).unwrap();
        assert_eq!(hit.id, "a");
    }

    #[test]
    fn empty_view_is_a_diagnostic_error() {
        let mut registry = PainPointRegistry::new(HotspotCatalog::default());
        let mut state = WizardState::new();
        let err = registry
            .click(&mut state, BodyView::Back, BOX, BOX.left + 10.0, BOX.top + 10.0)
            .unwrap_err();
        assert!(matches!(err, BodyMapError::NoHotspots(BodyView::Back)));
        assert!(state.pain_points.is_empty());
    }

    #[test]
    fn confirm_without_pending_fails() {
        let mut registry = PainPointRegistry::default();
        let mut state = WizardState::new();
        assert!(matches!(
            registry.confirm_pending(&mut state, Some(3)),
            Err(BodyMapError::NothingPending)
        ));
    }

    #[test]
    fn cancel_discards_pending() {
        let mut registry = PainPointRegistry::default();
        let mut state = WizardState::new();
        let (x, y) = click_on(&registry, BodyView::Front, "knee-r");
        registry.click(&mut state, BodyView::Front, BOX, x, y).unwrap();
        assert!(registry.cancel_pending());
        assert!(!registry.cancel_pending());
        assert!(state.pain_points.is_empty());
    }

    #[test]
    fn markers_use_percent_positions_per_view() {
        let mut registry = PainPointRegistry::default();
        let mut state = WizardState::new();
        let (x, y) = click_on(&registry, BodyView::Front, "chest");
        registry.click(&mut state, BodyView::Front, BOX, x, y).unwrap();
        registry.confirm_pending(&mut state, Some(9)).unwrap();

        let front = PainPointRegistry::markers(&state, BodyView::Front);
        assert_eq!(front.len(), 1);
        assert!((front[0].left_percent - 50.0).abs() < 1e-6);
        assert!((front[0].top_percent - 24.0).abs() < 1e-6);
        assert_eq!(front[0].intensity_level, IntensityLevel::High);
        assert!(PainPointRegistry::markers(&state, BodyView::Back).is_empty());
    }

    #[test]
    fn remove_by_key_clears_point() {
        let mut registry = PainPointRegistry::default();
        let mut state = WizardState::new();
        let (x, y) = click_on(&registry, BodyView::Front, "neck");
        registry.click(&mut state, BodyView::Front, BOX, x, y).unwrap();
        let point = registry.confirm_pending(&mut state, Some(2)).unwrap();
        assert!(registry.remove(&mut state, &point.key).is_some());
        assert!(registry.remove(&mut state, &point.key).is_none());
    }
}
