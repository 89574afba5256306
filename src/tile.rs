use bevy::prelude::*;

use crate::atlas::{AtlasProvider, TileUvs};
use crate::geometry::TRIANGLES_PER_CELL;

/// Color of an untinted tile.
pub const NO_TINT: Color = Color::WHITE;

/// Opacity of a ghost that differs from the committed tile.
pub const DEFAULT_GHOST_OPACITY: f32 = 0.8;

/// Reference to a tile in a tileset.
/// A negative id in either field means "empty cell".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TileRef {
    pub tileset_id: i32,
    pub tile_id: i32,
}

impl TileRef {
    pub const EMPTY: TileRef = TileRef {
        tileset_id: -1,
        tile_id: -1,
    };

    pub const fn new(tileset_id: i32, tile_id: i32) -> Self {
        Self { tileset_id, tile_id }
    }

    /// True iff this references an actual tile, i.e. something gets drawn.
    pub fn is_resolvable(&self) -> bool {
        self.tileset_id >= 0 && self.tile_id >= 0
    }

    pub fn is_empty(&self) -> bool {
        !self.is_resolvable()
    }
}

impl Default for TileRef {
    fn default() -> Self {
        Self::EMPTY
    }
}

/// Render state of a single grid cell.
///
/// The committed tile is whatever the map says, the ghost is a transient
/// preview (eg. from a brush under the cursor) that is drawn instead without
/// touching the committed tile.
#[derive(Debug, Clone)]
pub struct TileState {
    position: UVec2,

    committed: TileRef,
    ghost: Option<TileRef>,
    tint: Option<Color>,
    opacity: f32,

    /// Effective tile `uvs` were last resolved for.
    resolved: Option<TileRef>,
    uvs: Option<TileUvs>,
    /// Atlas for `resolved` was missing, retry on next update.
    pending: bool,

    last_color: Color,
    last_opacity: f32,

    /// Triangles already written with the current state, 0..=2.
    dirty_triangles: u8,
}

impl TileState {
    pub fn new(position: UVec2) -> Self {
        Self {
            position,
            committed: TileRef::EMPTY,
            ghost: None,
            tint: None,
            opacity: 1.0,
            // A fresh cell is empty and shows nothing anywhere
            resolved: Some(TileRef::EMPTY),
            uvs: None,
            pending: false,
            last_color: NO_TINT,
            last_opacity: 1.0,
            dirty_triangles: TRIANGLES_PER_CELL as u8,
        }
    }

    /// Grid coordinates of this cell.
    pub fn position(&self) -> UVec2 {
        self.position
    }

    pub fn committed(&self) -> TileRef {
        self.committed
    }

    pub fn ghost(&self) -> Option<TileRef> {
        self.ghost
    }

    /// The tile that is actually drawn: the ghost if there is one,
    /// the committed tile otherwise.
    pub fn effective(&self) -> TileRef {
        self.ghost.unwrap_or(self.committed)
    }

    pub fn tint(&self) -> Option<Color> {
        self.tint
    }

    /// Color written to the vertex buffers.
    pub fn color(&self) -> Color {
        self.tint.unwrap_or(NO_TINT)
    }

    pub fn opacity(&self) -> f32 {
        self.opacity
    }

    /// Cached atlas UVs of the effective tile, if resolved.
    pub fn uvs(&self) -> Option<&TileUvs> {
        self.uvs.as_ref()
    }

    pub fn is_pending(&self) -> bool {
        self.pending
    }

    pub fn dirty_triangles(&self) -> u8 {
        self.dirty_triangles
    }

    /// True iff both triangles of this cell hold the current state.
    pub fn is_settled(&self) -> bool {
        self.dirty_triangles as usize >= TRIANGLES_PER_CELL
    }

    /// Set or clear the ghost. Takes effect on the next [`Self::update`].
    pub fn set_ghost(&mut self, ghost: Option<TileRef>) {
        self.ghost = ghost;
    }

    /// Set or clear the tint. Takes effect on the next [`Self::update`].
    pub fn set_tint(&mut self, tint: Option<Color>) {
        self.tint = tint;
    }

    /// Force both triangles to be rewritten on the next pass.
    pub fn invalidate(&mut self) {
        self.dirty_triangles = 0;
    }

    /// Forget the resolved UVs so they are looked up again on the next update,
    /// eg. after the atlas of the tileset changed.
    pub fn invalidate_uvs(&mut self) {
        self.resolved = None;
        self.uvs = None;
        self.pending = false;
        self.dirty_triangles = 0;
    }

    /// Resolve this cell against `committed`.
    ///
    /// UVs are only looked up when the effective tile changed (or the atlas
    /// was missing last time). Any visible change resets the dirty triangle
    /// counter. Returns whether the cell needs to be rewritten.
    pub fn update<A>(&mut self, committed: TileRef, atlases: &A, ghost_opacity: f32) -> bool
    where
        A: AtlasProvider + ?Sized,
    {
        self.committed = committed;
        let effective = self.effective();

        self.opacity = match self.ghost {
            Some(ghost) if ghost != committed => ghost_opacity,
            _ => 1.0,
        };

        let mut changed = false;

        if self.resolved != Some(effective) || self.pending {
            let tile_changed = self.resolved != Some(effective);
            self.resolve_uvs(effective, atlases);
            // Still waiting for the same atlas is not a change
            changed |= tile_changed || !self.pending;
        }

        let color = self.color();
        changed |= color != self.last_color || self.opacity != self.last_opacity;
        self.last_color = color;
        self.last_opacity = self.opacity;

        if changed {
            self.dirty_triangles = 0;
        }
        changed
    } // fn update

    fn resolve_uvs<A>(&mut self, effective: TileRef, atlases: &A)
    where
        A: AtlasProvider + ?Sized,
    {
        self.resolved = Some(effective);
        self.uvs = None;
        self.pending = false;

        if !effective.is_resolvable() {
            return;
        }

        match atlases.atlas(effective.tileset_id) {
            Some(atlas) => self.uvs = Some(atlas.tile_uvs(effective.tile_id)),
            None => self.pending = true,
        }
    }

    /// UVs to draw into the mesh of `tileset_id`, `None` if this cell shows
    /// nothing there.
    pub(crate) fn drawable_uvs(&self, tileset_id: i32) -> Option<&TileUvs> {
        let effective = self.effective();
        if effective.tileset_id != tileset_id || effective.tile_id < 0 {
            return None;
        }
        self.uvs.as_ref()
    }

    pub(crate) fn mark_written(&mut self) {
        self.dirty_triangles = (self.dirty_triangles + 1).min(TRIANGLES_PER_CELL as u8);
    }

    pub(crate) fn settle(&mut self) {
        self.dirty_triangles = TRIANGLES_PER_CELL as u8;
    }
} // impl TileState

#[cfg(test)]
mod tests {
    use super::*;
    use crate::atlas::{TextureAtlas, SENTINEL_UVS};
    use bevy::math::vec2;
    use std::collections::HashMap;

    fn atlases() -> HashMap<i32, TextureAtlas> {
        let atlas = TextureAtlas::new(Handle::default(), vec2(32.0, 32.0), vec2(16.0, 16.0)).unwrap();
        HashMap::from([(0, atlas)])
    }

    fn settled(committed: TileRef, atlases: &HashMap<i32, TextureAtlas>) -> TileState {
        let mut tile = TileState::new(UVec2::ZERO);
        assert!(tile.update(committed, atlases, DEFAULT_GHOST_OPACITY));
        tile.settle();
        tile
    }

    #[test]
    fn empty_ref() {
        assert!(TileRef::EMPTY.is_empty());
        assert!(TileRef::new(0, -1).is_empty());
        assert!(TileRef::new(-1, 3).is_empty());
        assert!(TileRef::new(0, 0).is_resolvable());
        assert_eq!(TileRef::default(), TileRef::EMPTY);
    }

    #[test]
    fn resolves_uvs_of_committed_tile() {
        let atlases = atlases();
        let mut tile = TileState::new(UVec2::ZERO);
        tile.update(TileRef::new(0, 3), &atlases, DEFAULT_GHOST_OPACITY);
        assert_eq!(tile.uvs(), Some(&atlases[&0].tile_uvs(3)));
        assert_eq!(tile.opacity(), 1.0);
        assert_eq!(tile.dirty_triangles(), 0);
    }

    #[test]
    fn repeated_update_is_idempotent() {
        let atlases = atlases();
        let mut tile = settled(TileRef::new(0, 1), &atlases);

        assert!(!tile.update(TileRef::new(0, 1), &atlases, DEFAULT_GHOST_OPACITY));
        assert!(!tile.update(TileRef::new(0, 1), &atlases, DEFAULT_GHOST_OPACITY));
        assert_eq!(tile.dirty_triangles(), 2);
    }

    #[test]
    fn ghost_overrides_and_dims() {
        let atlases = atlases();
        let mut tile = settled(TileRef::new(0, 0), &atlases);

        // equal ghost: full opacity, same tile, nothing to redraw
        tile.set_ghost(Some(TileRef::new(0, 0)));
        assert!(!tile.update(TileRef::new(0, 0), &atlases, DEFAULT_GHOST_OPACITY));
        assert_eq!(tile.opacity(), 1.0);

        tile.set_ghost(Some(TileRef::new(0, 1)));
        assert!(tile.update(TileRef::new(0, 0), &atlases, DEFAULT_GHOST_OPACITY));
        assert_eq!(tile.opacity(), DEFAULT_GHOST_OPACITY);
        assert_eq!(tile.effective(), TileRef::new(0, 1));
        assert_eq!(tile.committed(), TileRef::new(0, 0));
        assert_eq!(tile.uvs(), Some(&atlases[&0].tile_uvs(1)));
        assert_eq!(tile.dirty_triangles(), 0);

        tile.settle();
        tile.set_ghost(None);
        assert!(tile.update(TileRef::new(0, 0), &atlases, DEFAULT_GHOST_OPACITY));
        assert_eq!(tile.opacity(), 1.0);
        assert_eq!(tile.uvs(), Some(&atlases[&0].tile_uvs(0)));
    }

    #[test]
    fn tint_change_resets_dirty_count() {
        let atlases = atlases();
        let mut tile = settled(TileRef::new(0, 0), &atlases);

        tile.set_tint(Some(Color::RED));
        assert!(tile.update(TileRef::new(0, 0), &atlases, DEFAULT_GHOST_OPACITY));
        assert_eq!(tile.color(), Color::RED);
        assert_eq!(tile.dirty_triangles(), 0);

        tile.settle();
        tile.set_tint(Some(Color::RED));
        assert!(!tile.update(TileRef::new(0, 0), &atlases, DEFAULT_GHOST_OPACITY));

        tile.set_tint(None);
        assert!(tile.update(TileRef::new(0, 0), &atlases, DEFAULT_GHOST_OPACITY));
        assert_eq!(tile.color(), NO_TINT);
    }

    #[test]
    fn missing_atlas_is_retried() {
        let mut atlases = atlases();
        let mut tile = TileState::new(UVec2::ZERO);

        assert!(tile.update(TileRef::new(1, 0), &atlases, DEFAULT_GHOST_OPACITY));
        assert!(tile.is_pending());
        assert!(tile.uvs().is_none());
        tile.settle();

        // still missing: nothing to redraw
        assert!(!tile.update(TileRef::new(1, 0), &atlases, DEFAULT_GHOST_OPACITY));
        assert!(tile.is_pending());

        let atlas = TextureAtlas::new(Handle::default(), vec2(16.0, 16.0), vec2(16.0, 16.0)).unwrap();
        atlases.insert(1, atlas);
        assert!(tile.update(TileRef::new(1, 0), &atlases, DEFAULT_GHOST_OPACITY));
        assert!(!tile.is_pending());
        assert!(tile.uvs().is_some());
        assert_eq!(tile.dirty_triangles(), 0);
    }

    #[test]
    fn empty_tile_has_no_uvs() {
        let atlases = atlases();
        let mut tile = TileState::new(UVec2::ZERO);
        tile.update(TileRef::new(0, -1), &atlases, DEFAULT_GHOST_OPACITY);
        assert!(tile.uvs().is_none());
        assert!(!tile.is_pending());
        assert!(tile.drawable_uvs(0).is_none());
        assert_ne!(atlases[&0].tile_uvs(0), SENTINEL_UVS);
    }

    #[test]
    fn drawable_only_in_own_tileset() {
        let atlases = atlases();
        let tile = settled(TileRef::new(0, 2), &atlases);
        assert!(tile.drawable_uvs(0).is_some());
        assert!(tile.drawable_uvs(1).is_none());
    }

    #[test]
    fn written_count_is_capped() {
        let mut tile = TileState::new(UVec2::ZERO);
        for _ in 0..5 {
            tile.mark_written();
        }
        assert_eq!(tile.dirty_triangles(), 2);
        assert!(tile.is_settled());
        tile.invalidate();
        assert_eq!(tile.dirty_triangles(), 0);
    }
}
