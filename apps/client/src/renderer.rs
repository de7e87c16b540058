//! Keeps one map in step with the relay's events.
//!
//! Every identity owns at most one marker and one accuracy overlay (a GeoJSON
//! source plus a fill layer). Position events upsert, disconnects remove, and
//! applying the same event twice leaves the map unchanged.

use std::collections::HashMap;

use geoshare_common::wire::PositionBroadcast;
use geoshare_common::{accuracy_feature, ConnectionId, LngLat, RosterEntry, ServerEvent};
use serde_json::Value;

use crate::roster::RosterView;
use crate::style::MapStyle;

pub const OVERLAY_COLOR: &str = "#007cbf";
pub const OVERLAY_OPACITY: f64 = 0.1;

pub fn source_id(id: &ConnectionId) -> String {
    format!("accuracy-{id}")
}

pub fn layer_id(id: &ConnectionId) -> String {
    format!("accuracy-layer-{id}")
}

/// A polygon fill layer drawn from one GeoJSON source.
#[derive(Debug, Clone, PartialEq)]
pub struct FillLayer {
    pub id: String,
    pub source: String,
    pub color: String,
    pub opacity: f64,
}

impl FillLayer {
    pub fn accuracy(id: &ConnectionId) -> Self {
        Self {
            id: layer_id(id),
            source: source_id(id),
            color: OVERLAY_COLOR.to_string(),
            opacity: OVERLAY_OPACITY,
        }
    }
}

/// What the renderer needs from a map widget.
pub trait MapBackend {
    type Marker;

    fn add_marker(&mut self, at: LngLat, popup: &str) -> Self::Marker;
    fn move_marker(&mut self, marker: &Self::Marker, at: LngLat);
    fn set_popup(&mut self, marker: &Self::Marker, text: &str);
    fn remove_marker(&mut self, marker: Self::Marker);

    /// Sources and layers can only be added once the style has loaded.
    fn is_style_loaded(&self) -> bool;
    fn has_source(&self, id: &str) -> bool;
    fn add_source(&mut self, id: &str, data: Value);
    fn set_source_data(&mut self, id: &str, data: Value);
    fn remove_source(&mut self, id: &str);
    fn has_layer(&self, id: &str) -> bool;
    fn add_fill_layer(&mut self, layer: &FillLayer);
    fn remove_layer(&mut self, id: &str);

    fn fly_to(&mut self, center: LngLat);
    /// Swapping the style drops every source and layer.
    fn set_style(&mut self, style: MapStyle);
}

#[derive(Debug, Clone, PartialEq)]
enum Overlay {
    Absent,
    /// Waiting for the style to load; holds the latest geometry.
    Pending(Value),
    Live,
}

struct MarkerState<M> {
    position: LngLat,
    accuracy: Option<f64>,
    name: String,
    marker: M,
    overlay: Overlay,
}

fn popup_text(name: &str) -> String {
    format!("User: {name}")
}

pub struct MapRenderer<B: MapBackend> {
    backend: B,
    markers: HashMap<ConnectionId, MarkerState<B::Marker>>,
    roster: RosterView,
    local: Option<ConnectionId>,
    style: MapStyle,
}

impl<B: MapBackend> MapRenderer<B> {
    pub fn new(mut backend: B, style: MapStyle) -> Self {
        backend.set_style(style);
        Self {
            backend,
            markers: HashMap::new(),
            roster: RosterView::default(),
            local: None,
            style,
        }
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn backend_mut(&mut self) -> &mut B {
        &mut self.backend
    }

    pub fn roster(&self) -> &RosterView {
        &self.roster
    }

    pub fn style(&self) -> MapStyle {
        self.style
    }

    pub fn local_identity(&self) -> Option<&ConnectionId> {
        self.local.as_ref()
    }

    pub fn marker_count(&self) -> usize {
        self.markers.len()
    }

    pub fn position_of(&self, id: &ConnectionId) -> Option<LngLat> {
        self.markers.get(id).map(|state| state.position)
    }

    pub fn set_local_identity(&mut self, id: ConnectionId) {
        self.local = Some(id);
    }

    pub fn apply(&mut self, event: &ServerEvent) {
        match event {
            ServerEvent::Connected(welcome) => self.set_local_identity(welcome.id.clone()),
            ServerEvent::ReceiveLocation(broadcast) => self.apply_broadcast(broadcast),
            ServerEvent::Roster(entries) => self.apply_roster(entries),
            ServerEvent::UserDisconnected(id) => self.apply_disconnect(id),
        }
    }

    pub fn apply_broadcast(&mut self, b: &PositionBroadcast) {
        self.apply_position(&b.id, b.latitude, b.longitude, &b.name, b.accuracy);
    }

    /// Create or update the marker and overlay for `id`.
    pub fn apply_position(
        &mut self,
        id: &ConnectionId,
        latitude: f64,
        longitude: f64,
        name: &str,
        accuracy: Option<f64>,
    ) {
        let at = LngLat::new(longitude, latitude);

        match self.markers.get_mut(id) {
            Some(state) => {
                state.position = at;
                state.accuracy = accuracy;
                self.backend.move_marker(&state.marker, at);
                if state.name != name {
                    state.name = name.to_string();
                    self.backend.set_popup(&state.marker, &popup_text(name));
                }

                let feature = accuracy_feature(at, accuracy);
                match state.overlay {
                    Overlay::Live => self.backend.set_source_data(&source_id(id), feature),
                    Overlay::Pending(ref mut pending) => *pending = feature,
                    Overlay::Absent if accuracy.is_some() => {
                        state.overlay = create_overlay(&mut self.backend, id, feature);
                    }
                    Overlay::Absent => {}
                }
            }
            None => {
                let marker = self.backend.add_marker(at, &popup_text(name));
                let overlay = match accuracy {
                    Some(_) => {
                        create_overlay(&mut self.backend, id, accuracy_feature(at, accuracy))
                    }
                    None => Overlay::Absent,
                };
                tracing::debug!(%id, name, "marker created");
                self.markers.insert(
                    id.clone(),
                    MarkerState {
                        position: at,
                        accuracy,
                        name: name.to_string(),
                        marker,
                        overlay,
                    },
                );
            }
        }

        self.roster.mark_positioned(id);
    }

    /// Drop everything drawn for `id`. Unknown identities are ignored.
    pub fn apply_disconnect(&mut self, id: &ConnectionId) {
        self.roster.remove(id);
        let Some(state) = self.markers.remove(id) else {
            return;
        };
        self.backend.remove_marker(state.marker);
        if state.overlay == Overlay::Live {
            remove_overlay(&mut self.backend, id);
        }
        tracing::debug!(%id, "marker removed");
    }

    pub fn apply_roster(&mut self, entries: &[RosterEntry]) {
        let markers = &self.markers;
        self.roster.rebuild(entries, self.local.as_ref(), |id| markers.contains_key(id));
    }

    /// Center the camera on `id`'s last position. `false` when none is known.
    pub fn focus(&mut self, id: &ConnectionId) -> bool {
        match self.markers.get(id) {
            Some(state) => {
                self.backend.fly_to(state.position);
                true
            }
            None => false,
        }
    }

    pub fn center_on(&mut self, at: LngLat) {
        self.backend.fly_to(at);
    }

    /// Flush overlays that were waiting for the style.
    pub fn on_style_loaded(&mut self) {
        if !self.backend.is_style_loaded() {
            return;
        }
        for (id, state) in self.markers.iter_mut() {
            let feature = match &state.overlay {
                Overlay::Pending(feature) => feature.clone(),
                _ => continue,
            };
            state.overlay = create_overlay(&mut self.backend, id, feature);
        }
    }

    /// Switch the base style. Live overlays go back to pending and are redrawn
    /// by the next [`on_style_loaded`](Self::on_style_loaded).
    pub fn set_style(&mut self, style: MapStyle) {
        self.style = style;
        self.backend.set_style(style);
        for state in self.markers.values_mut() {
            if state.overlay == Overlay::Live {
                state.overlay = Overlay::Pending(accuracy_feature(state.position, state.accuracy));
            }
        }
        // Some backends load synchronously.
        self.on_style_loaded();
    }

    /// Clear everything, e.g. before joining under a new identity.
    pub fn reset(&mut self) {
        let ids: Vec<ConnectionId> = self.markers.keys().cloned().collect();
        for id in &ids {
            self.apply_disconnect(id);
        }
        self.roster.clear();
        self.local = None;
    }
}

fn create_overlay<B: MapBackend>(backend: &mut B, id: &ConnectionId, feature: Value) -> Overlay {
    if !backend.is_style_loaded() {
        return Overlay::Pending(feature);
    }
    let source = source_id(id);
    if backend.has_source(&source) {
        backend.set_source_data(&source, feature);
    } else {
        backend.add_source(&source, feature);
    }
    let layer = FillLayer::accuracy(id);
    if !backend.has_layer(&layer.id) {
        backend.add_fill_layer(&layer);
    }
    Overlay::Live
}

fn remove_overlay<B: MapBackend>(backend: &mut B, id: &ConnectionId) {
    let layer = layer_id(id);
    if backend.has_layer(&layer) {
        backend.remove_layer(&layer);
    }
    let source = source_id(id);
    if backend.has_source(&source) {
        backend.remove_source(&source);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::headless::HeadlessMap;
    use geoshare_common::geo::DEFAULT_ACCURACY_METERS;
    use geoshare_common::wire::Welcome;

    fn loaded() -> MapRenderer<HeadlessMap> {
        let mut renderer = MapRenderer::new(HeadlessMap::default(), MapStyle::Streets);
        renderer.backend_mut().finish_style_load();
        renderer
    }

    fn amy() -> ConnectionId {
        ConnectionId::from("conn_a")
    }

    #[test]
    fn first_position_creates_marker_and_overlay() {
        let mut r = loaded();
        r.apply_position(&amy(), 10.0, 20.0, "Amy", Some(5.0));

        let map = r.backend();
        assert_eq!(map.marker_count(), 1);
        let marker = map.markers().next().unwrap();
        assert_eq!(marker.at, LngLat::new(20.0, 10.0));
        assert_eq!(marker.popup, "User: Amy");
        assert_eq!(
            map.source("accuracy-conn_a"),
            Some(&accuracy_feature(LngLat::new(20.0, 10.0), Some(5.0)))
        );
        let layer = map.layer("accuracy-layer-conn_a").unwrap();
        assert_eq!(layer.source, "accuracy-conn_a");
        assert_eq!(layer.color, "#007cbf");
        assert_eq!(layer.opacity, 0.1);
    }

    #[test]
    fn no_accuracy_means_no_overlay_on_first_sight() {
        let mut r = loaded();
        r.apply_position(&amy(), 10.0, 20.0, "Amy", None);
        assert_eq!(r.backend().marker_count(), 1);
        assert_eq!(r.backend().source_count(), 0);
        assert_eq!(r.backend().layer_count(), 0);
    }

    #[test]
    fn repeated_position_is_idempotent() {
        let mut r = loaded();
        r.apply_position(&amy(), 10.0, 20.0, "Amy", Some(5.0));
        r.apply_position(&amy(), 10.0, 20.0, "Amy", Some(5.0));

        assert_eq!(r.marker_count(), 1);
        assert_eq!(r.backend().marker_count(), 1);
        assert_eq!(r.backend().source_count(), 1);
        assert_eq!(r.backend().layer_count(), 1);
        assert_eq!(r.backend().source_adds(), 1);
    }

    #[test]
    fn update_moves_marker_and_replaces_overlay_data() {
        let mut r = loaded();
        r.apply_position(&amy(), 10.0, 20.0, "Amy", Some(5.0));
        r.apply_position(&amy(), 10.5, 20.5, "Amelia", None);

        let map = r.backend();
        let marker = map.markers().next().unwrap();
        assert_eq!(marker.at, LngLat::new(20.5, 10.5));
        assert_eq!(marker.popup, "User: Amelia");
        assert_eq!(map.source_adds(), 1);
        assert_eq!(map.source_updates(), 1);
        // Existing overlay without accuracy falls back to the default radius.
        assert_eq!(
            map.source("accuracy-conn_a"),
            Some(&accuracy_feature(
                LngLat::new(20.5, 10.5),
                Some(DEFAULT_ACCURACY_METERS)
            ))
        );
    }

    #[test]
    fn accuracy_on_a_later_update_creates_the_overlay() {
        let mut r = loaded();
        r.apply_position(&amy(), 10.0, 20.0, "Amy", None);
        r.apply_position(&amy(), 10.0, 20.0, "Amy", Some(30.0));
        assert_eq!(r.backend().source_count(), 1);
        assert_eq!(r.backend().layer_count(), 1);
    }

    #[test]
    fn disconnect_removes_layer_before_source() {
        let mut r = loaded();
        r.apply_position(&amy(), 10.0, 20.0, "Amy", Some(5.0));
        r.apply_disconnect(&amy());

        let map = r.backend();
        assert_eq!(map.marker_count(), 0);
        assert_eq!(map.source_count(), 0);
        assert_eq!(map.layer_count(), 0);
        assert_eq!(map.violations(), 0);
        assert_eq!(r.marker_count(), 0);
    }

    #[test]
    fn disconnect_of_unknown_identity_is_a_no_op() {
        let mut r = loaded();
        r.apply_position(&amy(), 10.0, 20.0, "Amy", Some(5.0));
        r.apply_disconnect(&ConnectionId::from("conn_zz"));
        assert_eq!(r.backend().marker_count(), 1);
        assert_eq!(r.backend().source_count(), 1);
    }

    #[test]
    fn overlay_waits_for_style_load() {
        let mut r = MapRenderer::new(HeadlessMap::default(), MapStyle::Streets);
        r.apply_position(&amy(), 10.0, 20.0, "Amy", Some(5.0));
        r.apply_position(&amy(), 11.0, 21.0, "Amy", Some(8.0));
        assert_eq!(r.backend().marker_count(), 1);
        assert_eq!(r.backend().source_count(), 0);

        r.backend_mut().finish_style_load();
        r.on_style_loaded();
        assert_eq!(
            r.backend().source("accuracy-conn_a"),
            Some(&accuracy_feature(LngLat::new(21.0, 11.0), Some(8.0)))
        );
        assert_eq!(r.backend().layer_count(), 1);
    }

    #[test]
    fn disconnect_before_style_load_drops_pending_overlay() {
        let mut r = MapRenderer::new(HeadlessMap::default(), MapStyle::Streets);
        r.apply_position(&amy(), 10.0, 20.0, "Amy", Some(5.0));
        r.apply_disconnect(&amy());
        r.backend_mut().finish_style_load();
        r.on_style_loaded();
        assert_eq!(r.backend().source_count(), 0);
        assert_eq!(r.backend().marker_count(), 0);
    }

    #[test]
    fn style_switch_redraws_overlays() {
        let mut r = loaded();
        r.apply_position(&amy(), 10.0, 20.0, "Amy", Some(5.0));
        r.set_style(MapStyle::Dark);
        assert_eq!(r.backend().style(), MapStyle::Dark);
        assert_eq!(r.backend().source_count(), 0);

        r.backend_mut().finish_style_load();
        r.on_style_loaded();
        assert_eq!(r.backend().source_count(), 1);
        assert_eq!(r.backend().layer_count(), 1);
        assert_eq!(r.backend().marker_count(), 1);
    }

    #[test]
    fn roster_marks_self_and_positions() {
        let mut r = loaded();
        r.apply(&ServerEvent::Connected(Welcome { id: ConnectionId::from("conn_b") }));
        r.apply_position(&amy(), 10.0, 20.0, "Amy", None);
        r.apply(&ServerEvent::Roster(vec![
            RosterEntry { id: amy(), name: "Amy".into() },
            RosterEntry { id: "conn_b".into(), name: "Bo".into() },
        ]));

        let items = r.roster().items();
        assert_eq!(items[0].name, "Bo");
        assert!(items[0].is_self);
        assert!(!items[0].has_position);
        assert!(items[1].has_position);

        r.apply(&ServerEvent::UserDisconnected(amy()));
        assert_eq!(r.roster().len(), 1);
    }

    #[test]
    fn focus_needs_a_known_position() {
        let mut r = loaded();
        assert!(!r.focus(&amy()));
        assert_eq!(r.backend().camera(), None);

        r.apply_position(&amy(), 10.0, 20.0, "Amy", None);
        assert!(r.focus(&amy()));
        assert_eq!(r.backend().camera(), Some(LngLat::new(20.0, 10.0)));
    }

    #[test]
    fn center_on_needs_no_marker() {
        let mut r = loaded();
        r.center_on(LngLat::new(2.0, 1.0));
        assert_eq!(r.backend().camera(), Some(LngLat::new(2.0, 1.0)));
        assert_eq!(r.backend().marker_count(), 0);
    }

    #[test]
    fn reset_clears_map_and_identity() {
        let mut r = loaded();
        r.set_local_identity(amy());
        r.apply_position(&amy(), 10.0, 20.0, "Amy", Some(5.0));
        r.apply_position(&"conn_b".into(), 11.0, 21.0, "Bo", None);
        r.reset();

        assert_eq!(r.marker_count(), 0);
        assert_eq!(r.backend().marker_count(), 0);
        assert_eq!(r.backend().source_count(), 0);
        assert!(r.local_identity().is_none());
        assert!(r.roster().is_empty());
    }
}
