//! In-memory map used by the terminal client and the tests.

use std::collections::{BTreeMap, HashMap};

use geoshare_common::LngLat;
use serde_json::Value;

use crate::renderer::{FillLayer, MapBackend};
use crate::style::MapStyle;

#[derive(Debug, Clone, PartialEq)]
pub struct HeadlessMarker {
    pub at: LngLat,
    pub popup: String,
}

/// Records markers, sources and layers the way a real map widget would hold
/// them. Removing a source that a layer still draws from is refused and
/// counted as a violation.
#[derive(Debug, Default)]
pub struct HeadlessMap {
    markers: BTreeMap<u64, HeadlessMarker>,
    next_marker: u64,
    sources: HashMap<String, Value>,
    layers: HashMap<String, FillLayer>,
    style: MapStyle,
    style_loaded: bool,
    auto_load: bool,
    camera: Option<LngLat>,
    source_adds: usize,
    source_updates: usize,
    violations: usize,
}

impl HeadlessMap {
    /// A map whose styles finish loading as soon as they are set.
    pub fn auto_loading() -> Self {
        Self {
            auto_load: true,
            style_loaded: true,
            ..Self::default()
        }
    }

    /// Marks the current style as loaded.
    pub fn finish_style_load(&mut self) {
        self.style_loaded = true;
    }

    pub fn markers(&self) -> impl Iterator<Item = &HeadlessMarker> {
        self.markers.values()
    }

    pub fn marker_count(&self) -> usize {
        self.markers.len()
    }

    pub fn source(&self, id: &str) -> Option<&Value> {
        self.sources.get(id)
    }

    pub fn source_count(&self) -> usize {
        self.sources.len()
    }

    pub fn layer(&self, id: &str) -> Option<&FillLayer> {
        self.layers.get(id)
    }

    pub fn layer_count(&self) -> usize {
        self.layers.len()
    }

    pub fn style(&self) -> MapStyle {
        self.style
    }

    pub fn camera(&self) -> Option<LngLat> {
        self.camera
    }

    pub fn source_adds(&self) -> usize {
        self.source_adds
    }

    pub fn source_updates(&self) -> usize {
        self.source_updates
    }

    pub fn violations(&self) -> usize {
        self.violations
    }
}

impl MapBackend for HeadlessMap {
    type Marker = u64;

    fn add_marker(&mut self, at: LngLat, popup: &str) -> u64 {
        let handle = self.next_marker;
        self.next_marker += 1;
        self.markers.insert(
            handle,
            HeadlessMarker {
                at,
                popup: popup.to_string(),
            },
        );
        handle
    }

    fn move_marker(&mut self, marker: &u64, at: LngLat) {
        if let Some(m) = self.markers.get_mut(marker) {
            m.at = at;
        }
    }

    fn set_popup(&mut self, marker: &u64, text: &str) {
        if let Some(m) = self.markers.get_mut(marker) {
            m.popup = text.to_string();
        }
    }

    fn remove_marker(&mut self, marker: u64) {
        self.markers.remove(&marker);
    }

    fn is_style_loaded(&self) -> bool {
        self.style_loaded
    }

    fn has_source(&self, id: &str) -> bool {
        self.sources.contains_key(id)
    }

    fn add_source(&mut self, id: &str, data: Value) {
        if self.sources.insert(id.to_string(), data).is_some() {
            self.violations += 1;
            tracing::warn!(source = id, "source added twice");
        }
        self.source_adds += 1;
    }

    fn set_source_data(&mut self, id: &str, data: Value) {
        match self.sources.get_mut(id) {
            Some(existing) => {
                *existing = data;
                self.source_updates += 1;
            }
            None => self.violations += 1,
        }
    }

    fn remove_source(&mut self, id: &str) {
        if self.layers.values().any(|layer| layer.source == id) {
            self.violations += 1;
            tracing::warn!(source = id, "refusing to remove a source still in use");
            return;
        }
        self.sources.remove(id);
    }

    fn has_layer(&self, id: &str) -> bool {
        self.layers.contains_key(id)
    }

    fn add_fill_layer(&mut self, layer: &FillLayer) {
        if !self.sources.contains_key(&layer.source) {
            self.violations += 1;
        }
        self.layers.insert(layer.id.clone(), layer.clone());
    }

    fn remove_layer(&mut self, id: &str) {
        self.layers.remove(id);
    }

    fn fly_to(&mut self, center: LngLat) {
        self.camera = Some(center);
    }

    fn set_style(&mut self, style: MapStyle) {
        self.style = style;
        self.style_loaded = self.auto_load;
        self.sources.clear();
        self.layers.clear();
    }
}
