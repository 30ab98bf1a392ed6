//! Shared text store with layers of self-relocating range markers.
//!
//! A [`PatchBuffer`] holds the rendered text of every file patch in a
//! [`MultiFilePatch`](crate::MultiFilePatch) together with six marker layers
//! (one per region kind, plus hunk and patch). Every edit runs a relocation pass over
//! all markers, so ranges keep denoting the same logical content as text around them
//! is inserted or removed. Markers are never invalidated by edits; they only go away
//! when destroyed explicitly.
//!
//! # Examples
//!
//! ```
//! use patch_model::buffer::{LayerName, MarkerOptions, PatchBuffer, Point, Range};
//!
//! let mut buffer = PatchBuffer::with_text("0000\n1111\n2222");
//! let marker = buffer.mark_range(LayerName::Hunk, Range::rows(1, 1), MarkerOptions::INCLUSIVE);
//!
//! buffer.insert(Point::new(0, 0), "new\n");
//! assert_eq!(buffer.range_of(marker), Range::new((2, 0), (2, 4)));
//! ```

mod inserter;
mod marker;
mod point;
mod text;

use std::cell::OnceCell;
use std::collections::{HashMap, HashSet};

pub use inserter::{Applied, BlueprintId, Inserter, MapId};
pub use marker::{LayerName, MarkerId, MarkerOptions};
pub use point::{END_OF_LINE, Point, Range};

use marker::{LayerIndex, MarkerState, ordering_key};
use text::TextBuffer;

/// Old-marker to new-marker substitution produced when content moves between buffers.
pub type MarkerMap = HashMap<MarkerId, MarkerId>;

/// Marker lookups supported by [`PatchBuffer::find_markers`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MarkerQuery {
    All,
    IntersectsRow(usize),
    EndsAt(Point),
}

/// Line-oriented text plus named marker layers.
#[derive(Debug, Default)]
pub struct PatchBuffer {
    text: TextBuffer,
    markers: HashMap<MarkerId, MarkerState>,
    indices: [OnceCell<LayerIndex>; 6],
}

impl PatchBuffer {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Buffer holding `text` and no markers.
    #[must_use]
    pub fn with_text(text: &str) -> Self {
        Self {
            text: TextBuffer::new(text),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn text(&self) -> String {
        self.text.text()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }

    #[must_use]
    pub fn last_row(&self) -> usize {
        self.text.last_row()
    }

    #[must_use]
    pub fn line(&self, row: usize) -> Option<&str> {
        self.text.line(row)
    }

    #[must_use]
    pub fn line_len(&self, row: usize) -> usize {
        self.text.line_len(row)
    }

    #[must_use]
    pub fn end_position(&self) -> Point {
        self.text.end_position()
    }

    /// Where appended content lands.
    #[must_use]
    pub fn insertion_point(&self) -> Point {
        self.end_position()
    }

    #[must_use]
    pub fn clip_range(&self, range: Range) -> Range {
        self.text.clip_range(range)
    }

    #[must_use]
    pub fn text_in_range(&self, range: Range) -> String {
        self.text.text_in_range(range)
    }

    // ---------------------------------------------------------------------
    // Markers
    // ---------------------------------------------------------------------

    /// Mark `range` (clipped to the text) on `layer`.
    pub fn mark_range(&mut self, layer: LayerName, range: Range, options: MarkerOptions) -> MarkerId {
        let id = MarkerId::next();
        let range = self.text.clip_range(range);
        self.markers.insert(
            id,
            MarkerState {
                layer,
                range,
                options,
            },
        );
        self.invalidate_layer(layer);
        id
    }

    /// Mark a zero-length range at `position`.
    pub fn mark_position(&mut self, layer: LayerName, position: Point, options: MarkerOptions) -> MarkerId {
        self.mark_range(layer, Range::empty_at(position), options)
    }

    /// Current range of a live marker.
    #[must_use]
    pub fn marker_range(&self, marker: MarkerId) -> Option<Range> {
        self.markers.get(&marker).map(|state| state.range)
    }

    /// Current range of `marker`, or an empty range at the origin if it no longer lives here.
    #[must_use]
    pub fn range_of(&self, marker: MarkerId) -> Range {
        self.marker_range(marker).unwrap_or_default()
    }

    #[must_use]
    pub fn marker_layer(&self, marker: MarkerId) -> Option<LayerName> {
        self.markers.get(&marker).map(|state| state.layer)
    }

    #[must_use]
    pub fn marker_options(&self, marker: MarkerId) -> Option<MarkerOptions> {
        self.markers.get(&marker).map(|state| state.options)
    }

    #[must_use]
    pub fn contains_marker(&self, marker: MarkerId) -> bool {
        self.markers.contains_key(&marker)
    }

    /// Move a marker without touching the text. Unknown markers are ignored.
    pub fn set_marker_range(&mut self, marker: MarkerId, range: Range) {
        let range = self.text.clip_range(range);
        if let Some(state) = self.markers.get_mut(&marker) {
            state.range = range;
            let layer = state.layer;
            self.invalidate_layer(layer);
        }
    }

    pub fn destroy_marker(&mut self, marker: MarkerId) {
        if let Some(state) = self.markers.remove(&marker) {
            self.invalidate_layer(state.layer);
        }
    }

    pub fn clear_all_layers(&mut self) {
        self.markers.clear();
        self.invalidate_all();
    }

    /// Markers on `layer` matching `query`, ordered by start (longest first on ties).
    #[must_use]
    pub fn find_markers(&self, layer: LayerName, query: MarkerQuery) -> Vec<MarkerId> {
        let index = self.layer_index(layer);
        match query {
            MarkerQuery::All => index.all().collect(),
            MarkerQuery::IntersectsRow(row) => index.intersecting_row(row),
            MarkerQuery::EndsAt(point) => index
                .all()
                .filter(|id| self.marker_range(*id).is_some_and(|range| range.end == point))
                .collect(),
        }
    }

    /// [`PatchBuffer::find_markers`] across every layer.
    #[must_use]
    pub fn find_all_markers(&self, query: MarkerQuery) -> Vec<MarkerId> {
        LayerName::ALL
            .iter()
            .flat_map(|layer| self.find_markers(*layer, query))
            .collect()
    }

    /// Number of live markers on `layer`.
    #[must_use]
    pub fn marker_count(&self, layer: LayerName) -> usize {
        self.layer_index(layer).all().count()
    }

    fn layer_index(&self, layer: LayerName) -> &LayerIndex {
        self.indices[layer.index()].get_or_init(|| {
            LayerIndex::build(
                self.markers
                    .iter()
                    .filter(|(_, state)| state.layer == layer)
                    .map(|(id, state)| (state.range, *id))
                    .collect(),
            )
        })
    }

    fn invalidate_layer(&mut self, layer: LayerName) {
        self.indices[layer.index()] = OnceCell::new();
    }

    fn invalidate_all(&mut self) {
        for cell in &mut self.indices {
            *cell = OnceCell::new();
        }
    }

    // ---------------------------------------------------------------------
    // Text edits
    // ---------------------------------------------------------------------

    /// Insert `text` at `at` and relocate every marker. Returns the inserted range.
    pub fn insert(&mut self, at: Point, text: &str) -> Range {
        let at = self.text.clip_point(at);
        if text.is_empty() {
            return Range::empty_at(at);
        }
        let end = self.text.insert(at, text);
        for state in self.markers.values_mut() {
            state.relocate_for_insert(at, end);
        }
        self.invalidate_all();
        Range::new(at, end)
    }

    /// Append `text` at the end of the buffer.
    pub fn append(&mut self, text: &str) -> Range {
        self.insert(self.end_position(), text)
    }

    /// Remove the text in `range` and relocate every marker.
    pub fn delete(&mut self, range: Range) {
        let range = self.text.clip_range(range);
        if range.is_empty() {
            return;
        }
        self.text.delete(range);
        for state in self.markers.values_mut() {
            state.relocate_for_delete(range);
        }
        self.invalidate_all();
    }

    /// Remove `row` along with one adjacent line break. The last row takes the break before it.
    pub fn delete_row(&mut self, row: usize) {
        let last_row = self.last_row();
        if row < last_row {
            self.delete(Range::new(Point::row_start(row), Point::row_start(row + 1)));
        } else if row > 0 {
            let previous = row - 1;
            self.delete(Range::new(
                Point::new(previous, self.line_len(previous)),
                Point::new(row, self.line_len(row)),
            ));
        } else {
            self.delete(Range::new(Point::row_start(0), Point::new(0, self.line_len(0))));
        }
    }

    /// Drop a single trailing blank line, if present.
    pub fn delete_last_newline(&mut self) {
        let last_row = self.last_row();
        if last_row > 0 && self.line_len(last_row) == 0 {
            self.delete_row(last_row);
        }
    }

    /// Replace all text, keeping (clipped) markers.
    pub fn set_text(&mut self, text: &str) {
        self.text = TextBuffer::new(text);
        for state in self.markers.values_mut() {
            state.range = self.text.clip_range(state.range);
        }
        self.invalidate_all();
    }

    // ---------------------------------------------------------------------
    // Moving content between buffers
    // ---------------------------------------------------------------------

    /// Copy `range` and every marker touching it into a new buffer, translated to local
    /// coordinates.
    ///
    /// Markers listed in `exclude` are skipped, as are markers that only touch the range at a
    /// boundary. Markers crossing a boundary are clipped.
    #[must_use]
    pub fn create_sub_buffer(&self, range: Range, exclude: &HashSet<MarkerId>) -> (PatchBuffer, MarkerMap) {
        let range = self.text.clip_range(range);
        let base = range.start;
        let mut sub_buffer = PatchBuffer::with_text(&self.text_in_range(range));
        let mut marker_map = MarkerMap::new();

        let mut candidates: Vec<(MarkerId, MarkerState)> = self
            .markers
            .iter()
            .filter(|(id, state)| !exclude.contains(*id) && state.range.intersects(&range))
            .map(|(id, state)| (*id, *state))
            .collect();
        candidates.sort_by_key(|(id, state)| (state.layer, ordering_key(&state.range, *id)));

        for (id, state) in candidates {
            let start = state.range.start.max(range.start);
            let end = state.range.end.min(range.end);
            if start == end && !state.range.is_empty() {
                continue;
            }
            let local = Range::new(start.translate_to_origin(base), end.translate_to_origin(base));
            let copy = sub_buffer.mark_range(state.layer, local, state.options);
            marker_map.insert(id, copy);
        }

        (sub_buffer, marker_map)
    }

    /// [`PatchBuffer::create_sub_buffer`], then destroy the copied markers and delete the range
    /// from this buffer.
    pub fn extract_patch_buffer(&mut self, range: Range, exclude: &HashSet<MarkerId>) -> (PatchBuffer, MarkerMap) {
        let (sub_buffer, marker_map) = self.create_sub_buffer(range, exclude);
        for original in marker_map.keys() {
            self.destroy_marker(*original);
        }
        self.delete(range);
        (sub_buffer, marker_map)
    }

    /// Replace this buffer's content and markers with a copy of `original`'s.
    pub fn adopt(&mut self, original: &PatchBuffer) -> MarkerMap {
        self.clear_all_layers();
        self.set_text(&original.text());

        let mut marker_map = MarkerMap::new();
        for layer in LayerName::ALL {
            for id in original.find_markers(layer, MarkerQuery::All) {
                if let Some(state) = original.markers.get(&id) {
                    let copy = self.mark_range(layer, state.range, state.options);
                    marker_map.insert(id, copy);
                }
            }
        }
        marker_map
    }

    /// Start a batched insertion at `point`.
    pub fn create_inserter_at(&mut self, point: Point) -> Inserter<'_> {
        Inserter::new(self, point)
    }

    /// Start a batched insertion at the end of the buffer.
    pub fn create_inserter_at_end(&mut self) -> Inserter<'_> {
        let end = self.end_position();
        Inserter::new(self, end)
    }
}
