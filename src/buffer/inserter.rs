use super::marker::{LayerName, MarkerId, MarkerOptions};
use super::point::{Point, Range};
use super::{MarkerMap, MarkerQuery, PatchBuffer};

/// Ticket for a marker that will exist once the [`Inserter`] is applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlueprintId(usize);

/// Ticket for the marker map of a sub-buffer inserted with [`Inserter::insert_patch_buffer`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MapId(usize);

#[derive(Debug)]
struct Blueprint {
    layer: LayerName,
    range: Range,
    options: MarkerOptions,
}

#[derive(Debug)]
struct PinnedMarker {
    marker: MarkerId,
    was_empty: bool,
}

/// Markers created by [`Inserter::apply`].
#[derive(Debug, Default)]
pub struct Applied {
    markers: Vec<MarkerId>,
    maps: Vec<MarkerMap>,
}

impl Applied {
    #[must_use]
    pub fn marker(&self, blueprint: BlueprintId) -> Option<MarkerId> {
        self.markers.get(blueprint.0).copied()
    }

    /// Old-to-new marker map for one inserted sub-buffer.
    #[must_use]
    pub fn marker_map(&self, map: MapId) -> Option<&MarkerMap> {
        self.maps.get(map.0)
    }
}

/// Panics if `blueprint` was issued by a different inserter.
impl std::ops::Index<BlueprintId> for Applied {
    type Output = MarkerId;

    fn index(&self, blueprint: BlueprintId) -> &MarkerId {
        &self.markers[blueprint.0]
    }
}

/// Batched insertion into a [`PatchBuffer`].
///
/// Text is written immediately, but new markers are only created by [`Inserter::apply`],
/// after every edit of the batch has happened. Existing markers pinned with
/// [`Inserter::keep_before`] or [`Inserter::keep_after`] end up on the matching side of the
/// inserted text instead of being stretched over it.
#[derive(Debug)]
pub struct Inserter<'a> {
    buffer: &'a mut PatchBuffer,
    start_point: Point,
    insertion_point: Point,
    blueprints: Vec<Blueprint>,
    sub_maps: Vec<Vec<(MarkerId, usize)>>,
    markers_before: Vec<PinnedMarker>,
    markers_after: Vec<PinnedMarker>,
}

impl<'a> Inserter<'a> {
    pub(super) fn new(buffer: &'a mut PatchBuffer, at: Point) -> Self {
        let at = buffer.text.clip_point(at);
        Self {
            buffer,
            start_point: at,
            insertion_point: at,
            blueprints: Vec::new(),
            sub_maps: Vec::new(),
            markers_before: Vec::new(),
            markers_after: Vec::new(),
        }
    }

    #[must_use]
    pub fn insertion_point(&self) -> Point {
        self.insertion_point
    }

    /// Keep markers that end at the start point ending there.
    pub fn keep_before(&mut self, markers: impl IntoIterator<Item = MarkerId>) -> &mut Self {
        for marker in markers {
            match self.buffer.marker_range(marker) {
                Some(range) if range.end == self.start_point => self.markers_before.push(PinnedMarker {
                    marker,
                    was_empty: range.is_empty(),
                }),
                _ => {}
            }
        }
        self
    }

    /// Keep markers that start at the start point starting after the inserted text.
    pub fn keep_after(&mut self, markers: impl IntoIterator<Item = MarkerId>) -> &mut Self {
        for marker in markers {
            match self.buffer.marker_range(marker) {
                Some(range) if range.start == self.start_point => self.markers_after.push(PinnedMarker {
                    marker,
                    was_empty: range.is_empty(),
                }),
                _ => {}
            }
        }
        self
    }

    /// Pin every marker already ending at the start point before the inserted text.
    pub fn keep_all_before(&mut self) -> &mut Self {
        let ending_here = self.buffer.find_all_markers(MarkerQuery::EndsAt(self.start_point));
        self.keep_before(ending_here)
    }

    pub fn insert(&mut self, text: &str) -> &mut Self {
        let inserted = self.buffer.insert(self.insertion_point, text);
        self.insertion_point = inserted.end;
        self
    }

    pub fn insert_if(&mut self, condition: bool, text: &str) -> &mut Self {
        if condition {
            self.insert(text);
        }
        self
    }

    /// Insert `text` and mark exactly the inserted range.
    pub fn insert_marked(&mut self, text: &str, layer: LayerName, options: MarkerOptions) -> BlueprintId {
        let start = self.insertion_point;
        self.insert(text);
        self.push_blueprint(layer, Range::new(start, self.insertion_point), options)
    }

    /// Run `f` and mark everything it inserted.
    pub fn mark_while<T>(
        &mut self,
        layer: LayerName,
        options: MarkerOptions,
        f: impl FnOnce(&mut Self) -> T,
    ) -> (T, BlueprintId) {
        let start = self.insertion_point;
        let value = f(self);
        let blueprint = self.push_blueprint(layer, Range::new(start, self.insertion_point), options);
        (value, blueprint)
    }

    /// Insert the text of `sub_buffer` and schedule copies of its markers.
    pub fn insert_patch_buffer(&mut self, sub_buffer: &PatchBuffer) -> MapId {
        let base = self.insertion_point;
        self.insert(&sub_buffer.text());

        let mut entries = Vec::new();
        for layer in LayerName::ALL {
            for marker in sub_buffer.find_markers(layer, MarkerQuery::All) {
                let Some(state) = sub_buffer.markers.get(&marker) else {
                    continue;
                };
                let range = Range::new(
                    state.range.start.translate_from_origin(base),
                    state.range.end.translate_from_origin(base),
                );
                let blueprint = self.push_blueprint(layer, range, state.options);
                entries.push((marker, blueprint.0));
            }
        }
        self.sub_maps.push(entries);
        MapId(self.sub_maps.len() - 1)
    }

    /// Create the scheduled markers and settle pinned ones around the inserted text.
    pub fn apply(&mut self) -> Applied {
        let markers: Vec<MarkerId> = self
            .blueprints
            .drain(..)
            .map(|Blueprint { layer, range, options }| self.buffer.mark_range(layer, range, options))
            .collect();

        let maps = self
            .sub_maps
            .drain(..)
            .map(|entries| {
                entries
                    .into_iter()
                    .map(|(original, blueprint)| (original, markers[blueprint]))
                    .collect()
            })
            .collect();

        for PinnedMarker { marker, was_empty } in self.markers_before.drain(..) {
            if let Some(range) = self.buffer.marker_range(marker) {
                let start = if was_empty { self.start_point } else { range.start };
                self.buffer.set_marker_range(marker, Range::new(start, self.start_point));
            }
        }

        for PinnedMarker { marker, was_empty } in self.markers_after.drain(..) {
            if let Some(range) = self.buffer.marker_range(marker) {
                let end = if was_empty { self.insertion_point } else { range.end };
                self.buffer.set_marker_range(marker, Range::new(self.insertion_point, end));
            }
        }

        Applied { markers, maps }
    }

    fn push_blueprint(&mut self, layer: LayerName, range: Range, options: MarkerOptions) -> BlueprintId {
        self.blueprints.push(Blueprint { layer, range, options });
        BlueprintId(self.blueprints.len() - 1)
    }
}
