//! One mesh per tileset, rewritten incrementally.
//!
//! A [`TileLayerBatcher`] owns the [`TileState`] of every cell of a layer and
//! one [`TilesetMesh`] for every tileset that is currently referenced by some
//! cell. Every mesh spans the full grid; cells that show something from a
//! different tileset (or nothing at all) are written as invisible triangles
//! into it. A cell is only rewritten after one of its visible properties
//! changed, so steady-state updates only touch changed cells.

use bevy::{log::{debug, trace}, prelude::*};
use std::collections::{btree_map::Entry, BTreeMap, BTreeSet};
use std::mem;
use std::sync::Arc;

use crate::atlas::{AtlasProvider, SENTINEL_UV};
use crate::error::LayerError;
use crate::geometry::{GridGeometry, ATTRIBUTE_OPACITY, TRIANGLES_PER_CELL};
use crate::layer_builder::TileLayerSettings;
use crate::picking::PickingIndex;
use crate::tile::{TileRef, TileState};

/// Vertex color of an invisible triangle.
pub const NEUTRAL_COLOR: [f32; 4] = [1.0, 1.0, 1.0, 1.0];

/// Per-vertex attributes of a tileset mesh, 3 vertices per triangle.
#[derive(Debug, Clone, PartialEq)]
pub struct MeshAttributes {
    pub uv: Vec<[f32; 2]>,
    pub color: Vec<[f32; 4]>,
    pub opacity: Vec<f32>,
}

impl MeshAttributes {
    /// Attributes with every triangle invisible.
    pub fn invisible(triangles: usize) -> Self {
        let vertices = triangles * 3;
        Self {
            uv: vec![SENTINEL_UV.to_array(); vertices],
            color: vec![NEUTRAL_COLOR; vertices],
            opacity: vec![1.0; vertices],
        }
    }

    pub fn triangle_count(&self) -> usize {
        self.opacity.len() / 3
    }

    pub fn write_triangle(&mut self, triangle: usize, uvs: &[Vec2; 3], color: [f32; 4], opacity: f32) {
        let base = triangle * 3;
        for (i, uv) in uvs.iter().enumerate() {
            self.uv[base + i] = uv.to_array();
            self.color[base + i] = color;
            self.opacity[base + i] = opacity;
        }
    }

    pub fn clear_triangle(&mut self, triangle: usize) {
        self.write_triangle(triangle, &[SENTINEL_UV; 3], NEUTRAL_COLOR, 1.0);
    }

    pub fn triangle_uvs(&self, triangle: usize) -> [Vec2; 3] {
        let base = triangle * 3;
        [0, 1, 2].map(|i| Vec2::from_array(self.uv[base + i]))
    }

    pub fn triangle_color(&self, triangle: usize) -> [f32; 4] {
        self.color[triangle * 3]
    }

    pub fn triangle_opacity(&self, triangle: usize) -> f32 {
        self.opacity[triangle * 3]
    }

    pub fn is_invisible(&self, triangle: usize) -> bool {
        self.triangle_uvs(triangle).iter().all(|uv| *uv == SENTINEL_UV)
    }

    /// Copy these attributes into `mesh`, which must have been built from the
    /// same geometry.
    pub fn apply_to(&self, mesh: &mut Mesh) {
        mesh.insert_attribute(Mesh::ATTRIBUTE_UV_0, self.uv.clone());
        mesh.insert_attribute(Mesh::ATTRIBUTE_COLOR, self.color.clone());
        mesh.insert_attribute(ATTRIBUTE_OPACITY, self.opacity.clone());
    }
} // impl MeshAttributes

/// Everything drawn with a single tileset: one draw call.
#[derive(Debug, Clone)]
pub struct TilesetMesh {
    tileset_id: i32,
    geometry: Arc<GridGeometry>,
    attributes: MeshAttributes,
    texture: Option<Handle<Image>>,
    visible: bool,
    needs_upload: bool,
}

impl TilesetMesh {
    fn new(tileset_id: i32, geometry: Arc<GridGeometry>) -> Self {
        let attributes = MeshAttributes::invisible(geometry.triangle_count());
        Self {
            tileset_id,
            geometry,
            attributes,
            texture: None,
            visible: false,
            needs_upload: true,
        }
    }

    pub fn tileset_id(&self) -> i32 {
        self.tileset_id
    }

    pub fn geometry(&self) -> &GridGeometry {
        &self.geometry
    }

    pub fn attributes(&self) -> &MeshAttributes {
        &self.attributes
    }

    /// Atlas texture, `None` until the atlas was available once.
    pub fn texture(&self) -> Option<&Handle<Image>> {
        self.texture.as_ref()
    }

    /// False while the atlas of this tileset is not available.
    pub fn is_visible(&self) -> bool {
        self.visible
    }

    pub fn needs_upload(&self) -> bool {
        self.needs_upload
    }

    /// Return whether attributes changed since the last call.
    pub fn take_needs_upload(&mut self) -> bool {
        mem::take(&mut self.needs_upload)
    }

    /// Whether `triangle` currently shows what `tile` (the owner of that
    /// triangle) says it should show in this mesh.
    pub fn shows(&self, triangle: usize, tile: &TileState) -> bool {
        let half = triangle % TRIANGLES_PER_CELL;
        match tile.drawable_uvs(self.tileset_id) {
            Some(uvs) => self.attributes.triangle_uvs(triangle) == uvs[half],
            None => self.attributes.is_invisible(triangle),
        }
    }

    /// Full bevy mesh with the current attributes.
    pub fn to_mesh(&self) -> Mesh {
        let mut mesh = self.geometry.to_mesh();
        self.attributes.apply_to(&mut mesh);
        mesh
    }
} // impl TilesetMesh

/// What happened during one [`TileLayerBatcher::update`] pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UpdateStats {
    /// Cells whose visible state changed.
    pub tiles_changed: usize,
    /// Triangles written with tile data.
    pub triangles_written: usize,
    /// Triangles written invisible.
    pub triangles_cleared: usize,
    pub meshes_created: usize,
    pub meshes_removed: usize,
    /// Live meshes hidden because their atlas is missing.
    pub meshes_hidden: usize,
}

impl UpdateStats {
    pub fn is_idle(&self) -> bool {
        *self == Self::default()
    }
}

/// A tile layer: per-cell state plus one batched mesh per tileset in use.
#[derive(Debug, Clone)]
pub struct TileLayerBatcher {
    size: UVec2,
    settings: TileLayerSettings,
    geometry: Arc<GridGeometry>,
    picking: PickingIndex,

    /// Committed content, row-major.
    cells: Vec<TileRef>,
    tiles: Vec<TileState>,
    meshes: BTreeMap<i32, TilesetMesh>,
}

impl TileLayerBatcher {
    /// Empty layer of `size` cells of `cell_size` layer units each.
    pub fn new(size: UVec2, cell_size: Vec2) -> Result<Self, LayerError> {
        if size.x == 0 || size.y == 0 {
            return Err(LayerError::EmptyGrid(size.x, size.y));
        }
        if !cell_size.is_finite() || cell_size.cmple(Vec2::ZERO).any() {
            return Err(LayerError::InvalidCellSize(cell_size));
        }

        let geometry = Arc::new(GridGeometry::build(cell_size.x, cell_size.y, size.x, size.y));
        let tiles = (0..size.y)
            .flat_map(|y| (0..size.x).map(move |x| TileState::new(UVec2::new(x, y))))
            .collect::<Vec<_>>();

        Ok(Self {
            size,
            settings: default(),
            picking: PickingIndex::new(geometry.clone()),
            geometry,
            cells: vec![TileRef::EMPTY; tiles.len()],
            tiles,
            meshes: BTreeMap::new(),
        })
    }

    pub fn with_settings(mut self, settings: TileLayerSettings) -> Self {
        self.set_settings(settings);
        self
    }

    pub fn settings(&self) -> &TileLayerSettings {
        &self.settings
    }

    /// Change settings. Ghost opacity is clamped to `0..=1` (NaN becomes
    /// opaque) and picked up on the next update.
    pub fn set_settings(&mut self, settings: TileLayerSettings) {
        let ghost_opacity = if settings.ghost_opacity.is_nan() {
            1.0
        } else {
            settings.ghost_opacity.clamp(0.0, 1.0)
        };
        self.settings = TileLayerSettings {
            ghost_opacity,
            ..settings
        };
    }

    /// Size of the grid in cells.
    pub fn size(&self) -> UVec2 {
        self.size
    }

    pub fn cell_size(&self) -> Vec2 {
        self.geometry.cell_size()
    }

    /// Number of cells.
    pub fn len(&self) -> usize {
        self.tiles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tiles.is_empty()
    }

    pub fn geometry(&self) -> &GridGeometry {
        &self.geometry
    }

    pub fn picking(&self) -> &PickingIndex {
        &self.picking
    }

    /// Cell under `position` (layer-local units), see [`PickingIndex::pick`].
    pub fn pick(&self, position: Vec2) -> Option<UVec2> {
        self.picking.pick(position)
    }

    /// Cell under `position` relative to the layer extent,
    /// see [`PickingIndex::pick_normalized`].
    pub fn pick_normalized(&self, position: Vec2) -> Option<UVec2> {
        self.picking.pick_normalized(position)
    }

    fn index_of(&self, x: u32, y: u32) -> Result<usize, LayerError> {
        if x >= self.size.x || y >= self.size.y {
            return Err(LayerError::OutOfBounds {
                x,
                y,
                width: self.size.x,
                height: self.size.y,
            });
        }
        Ok((y * self.size.x + x) as usize)
    }

    /// Replace the committed content of every cell.
    pub fn set_cells(&mut self, cells: Vec<TileRef>) -> Result<(), LayerError> {
        if cells.len() != self.tiles.len() {
            return Err(LayerError::LengthMismatch {
                expected: self.tiles.len(),
                actual: cells.len(),
            });
        }
        self.cells = cells;
        Ok(())
    }

    pub fn cells(&self) -> &[TileRef] {
        &self.cells
    }

    /// Committed content of cell (x, y).
    pub fn cell(&self, x: u32, y: u32) -> Option<TileRef> {
        let idx = self.index_of(x, y).ok()?;
        Some(self.cells[idx])
    }

    pub fn set_tile(&mut self, x: u32, y: u32, tile: TileRef) -> Result<(), LayerError> {
        let idx = self.index_of(x, y)?;
        self.cells[idx] = tile;
        Ok(())
    }

    /// Set the ghost of every cell, index-aligned with the grid.
    pub fn set_ghosts(&mut self, ghosts: &[Option<TileRef>]) -> Result<(), LayerError> {
        if ghosts.len() != self.tiles.len() {
            return Err(LayerError::LengthMismatch {
                expected: self.tiles.len(),
                actual: ghosts.len(),
            });
        }
        for (tile, ghost) in self.tiles.iter_mut().zip(ghosts) {
            tile.set_ghost(*ghost);
        }
        Ok(())
    }

    pub fn set_ghost(&mut self, x: u32, y: u32, ghost: Option<TileRef>) -> Result<(), LayerError> {
        let idx = self.index_of(x, y)?;
        self.tiles[idx].set_ghost(ghost);
        Ok(())
    }

    pub fn clear_ghosts(&mut self) {
        for tile in self.tiles.iter_mut() {
            tile.set_ghost(None);
        }
    }

    pub fn set_tint(&mut self, x: u32, y: u32, tint: Option<Color>) -> Result<(), LayerError> {
        let idx = self.index_of(x, y)?;
        self.tiles[idx].set_tint(tint);
        Ok(())
    }

    pub fn get_tile(&self, x: u32, y: u32) -> Option<&TileState> {
        let idx = self.index_of(x, y).ok()?;
        self.tiles.get(idx)
    }

    pub fn get_tile_mut(&mut self, x: u32, y: u32) -> Option<&mut TileState> {
        let idx = self.index_of(x, y).ok()?;
        self.tiles.get_mut(idx)
    }

    pub fn get_tile_by_index(&self, index: usize) -> Result<&TileState, LayerError> {
        self.tiles.get(index).ok_or(LayerError::IndexOutOfBounds {
            index,
            len: self.tiles.len(),
        })
    }

    pub fn tiles(&self) -> impl Iterator<Item = &TileState> {
        self.tiles.iter()
    }

    /// Live meshes, ordered by tileset id.
    pub fn meshes(&self) -> impl Iterator<Item = &TilesetMesh> {
        self.meshes.values()
    }

    pub(crate) fn meshes_mut(&mut self) -> impl Iterator<Item = &mut TilesetMesh> {
        self.meshes.values_mut()
    }

    pub fn mesh(&self, tileset_id: i32) -> Option<&TilesetMesh> {
        self.meshes.get(&tileset_id)
    }

    pub fn mesh_count(&self) -> usize {
        self.meshes.len()
    }

    /// Look up the UVs of every cell showing `tileset_id` again on the next
    /// update, eg. after its atlas was replaced.
    pub fn invalidate_tileset(&mut self, tileset_id: i32) {
        for tile in self.tiles.iter_mut() {
            if tile.effective().tileset_id == tileset_id {
                tile.invalidate_uvs();
            }
        }
    }

    /// Rewrite every cell on the next update.
    pub fn invalidate_all(&mut self) {
        for tile in self.tiles.iter_mut() {
            tile.invalidate();
        }
    }

    /// Advance one frame: resolve every cell, create / drop tileset meshes and
    /// rewrite the triangles of cells that changed.
    pub fn update<A>(&mut self, atlases: &A) -> UpdateStats
    where
        A: AtlasProvider + ?Sized,
    {
        let mut stats = UpdateStats::default();

        let in_use = self.update_tiles(atlases, &mut stats);
        // Meshes must exist before anything is written to them
        self.sync_meshes(&in_use, &mut stats);
        self.bind_textures(atlases, &mut stats);
        self.write_attributes(&mut stats);

        if !stats.is_idle() {
            trace!(
                "tile layer {}x{}: {} tiles changed, {} triangles written, {} cleared, {} meshes ({} hidden)",
                self.size.x,
                self.size.y,
                stats.tiles_changed,
                stats.triangles_written,
                stats.triangles_cleared,
                self.meshes.len(),
                stats.meshes_hidden,
            );
        }
        stats
    } // fn update

    /// Step 1: update every cell, collect the tilesets in use.
    fn update_tiles<A>(&mut self, atlases: &A, stats: &mut UpdateStats) -> BTreeSet<i32>
    where
        A: AtlasProvider + ?Sized,
    {
        let ghost_opacity = self.settings.ghost_opacity;
        let mut in_use = BTreeSet::new();

        for (tile, committed) in self.tiles.iter_mut().zip(&self.cells) {
            if tile.update(*committed, atlases, ghost_opacity) {
                stats.tiles_changed += 1;
            }
            let effective = tile.effective();
            if effective.is_resolvable() {
                in_use.insert(effective.tileset_id);
            }
        }
        in_use
    }

    /// Step 2: one mesh per tileset in use.
    fn sync_meshes(&mut self, in_use: &BTreeSet<i32>, stats: &mut UpdateStats) {
        self.meshes.retain(|tileset_id, _| {
            let keep = in_use.contains(tileset_id);
            if !keep {
                debug!("tileset {} no longer in use, dropping its mesh", tileset_id);
                stats.meshes_removed += 1;
            }
            keep
        });

        for &tileset_id in in_use {
            if let Entry::Vacant(entry) = self.meshes.entry(tileset_id) {
                debug!("tileset {} now in use, creating mesh", tileset_id);
                entry.insert(TilesetMesh::new(tileset_id, self.geometry.clone()));
                stats.meshes_created += 1;

                // The new mesh starts out invisible, every cell it should show
                // needs to be written regardless of what it was settled to
                for tile in self.tiles.iter_mut() {
                    if tile.effective().tileset_id == tileset_id {
                        tile.invalidate();
                    }
                }
            }
        }
    } // fn sync_meshes

    /// Step 3: hide meshes whose atlas is not available.
    fn bind_textures<A>(&mut self, atlases: &A, stats: &mut UpdateStats)
    where
        A: AtlasProvider + ?Sized,
    {
        for (tileset_id, mesh) in self.meshes.iter_mut() {
            match atlases.atlas(*tileset_id) {
                Some(atlas) => {
                    if mesh.texture.as_ref() != Some(&atlas.texture) {
                        mesh.texture = Some(atlas.texture.clone());
                        mesh.needs_upload = true;
                    }
                    mesh.visible = true;
                }
                None => {
                    if mesh.visible {
                        debug!("atlas for tileset {} not available, hiding its mesh", tileset_id);
                    }
                    mesh.visible = false;
                    stats.meshes_hidden += 1;
                }
            }
        }
    }

    /// Step 4: rewrite the triangles of every cell that is not settled.
    fn write_attributes(&mut self, stats: &mut UpdateStats) {
        let dirty: Vec<usize> = self
            .tiles
            .iter()
            .enumerate()
            .filter(|(_, tile)| !tile.is_settled())
            .map(|(idx, _)| idx)
            .collect();

        if dirty.is_empty() {
            return;
        }

        for (tileset_id, mesh) in self.meshes.iter_mut() {
            for &cell in &dirty {
                let tile = &mut self.tiles[cell];
                let color = tile.color().as_rgba_f32();
                let opacity = tile.opacity();
                let uvs = tile.drawable_uvs(*tileset_id).copied();

                for half in 0..TRIANGLES_PER_CELL {
                    let triangle = cell * TRIANGLES_PER_CELL + half;
                    match &uvs {
                        Some(uvs) if tile.dirty_triangles() < TRIANGLES_PER_CELL as u8 => {
                            mesh.attributes.write_triangle(triangle, &uvs[half], color, opacity);
                            tile.mark_written();
                            stats.triangles_written += 1;
                        }
                        _ => {
                            mesh.attributes.clear_triangle(triangle);
                            stats.triangles_cleared += 1;
                        }
                    }
                }
            }
            mesh.needs_upload = true;
        }

        // Cells drawn nowhere (empty, pending) are settled as well,
        // they are fully cleared in every mesh by now
        for cell in dirty {
            self.tiles[cell].settle();
        }
    } // fn write_attributes
} // impl TileLayerBatcher

#[cfg(test)]
mod tests {
    use super::*;
    use crate::atlas::TextureAtlas;
    use crate::tile::NO_TINT;
    use bevy::math::vec2;
    use std::collections::HashMap;

    fn atlas() -> TextureAtlas {
        TextureAtlas::new(Handle::default(), vec2(32.0, 32.0), vec2(16.0, 16.0)).unwrap()
    }

    fn layer(w: u32, h: u32) -> TileLayerBatcher {
        TileLayerBatcher::new(UVec2::new(w, h), vec2(16.0, 16.0)).unwrap()
    }

    #[test]
    fn rejects_degenerate_grids() {
        assert_eq!(
            TileLayerBatcher::new(UVec2::new(3, 0), vec2(1.0, 1.0)).unwrap_err(),
            LayerError::EmptyGrid(3, 0)
        );
        assert!(matches!(
            TileLayerBatcher::new(UVec2::new(3, 3), vec2(0.0, 1.0)),
            Err(LayerError::InvalidCellSize(_))
        ));
    }

    #[test]
    fn ghost_opacity_is_clamped() {
        let atlases = HashMap::from([(0, atlas())]);
        let settings = TileLayerSettings {
            ghost_opacity: 1.7,
            ..default()
        };
        let mut layer = layer(1, 1).with_settings(settings);
        assert_eq!(layer.settings().ghost_opacity, 1.0);

        layer.set_settings(TileLayerSettings {
            ghost_opacity: -0.3,
            ..settings
        });
        assert_eq!(layer.settings().ghost_opacity, 0.0);

        layer.set_cells(vec![TileRef::new(0, 0)]).unwrap();
        layer.set_ghost(0, 0, Some(TileRef::new(0, 1))).unwrap();
        layer.update(&atlases);
        assert_eq!(layer.mesh(0).unwrap().attributes().triangle_opacity(0), 0.0);

        layer.set_settings(TileLayerSettings {
            ghost_opacity: f32::NAN,
            ..settings
        });
        assert_eq!(layer.settings().ghost_opacity, 1.0);
    }

    #[test]
    fn empty_layer_has_no_meshes() {
        let mut layer = layer(4, 4);
        let stats = layer.update(&HashMap::from([(0, atlas())]));
        assert_eq!(layer.mesh_count(), 0);
        assert_eq!(stats.triangles_written, 0);
        assert_eq!(stats.tiles_changed, 0);
    }

    #[test]
    fn length_mismatches_are_errors() {
        let mut layer = layer(2, 2);
        assert_eq!(
            layer.set_cells(vec![TileRef::EMPTY; 3]),
            Err(LayerError::LengthMismatch { expected: 4, actual: 3 })
        );
        assert_eq!(
            layer.set_ghosts(&[None; 5]),
            Err(LayerError::LengthMismatch { expected: 4, actual: 5 })
        );
        assert!(matches!(
            layer.set_tile(2, 0, TileRef::new(0, 0)),
            Err(LayerError::OutOfBounds { x: 2, y: 0, .. })
        ));
        assert!(layer.get_tile(0, 2).is_none());
        assert!(layer.get_tile_by_index(4).is_err());
    }

    #[test]
    fn tint_and_opacity_are_written() {
        let atlases = HashMap::from([(0, atlas())]);
        let mut layer = layer(2, 1);
        layer.set_cells(vec![TileRef::new(0, 0); 2]).unwrap();
        layer.set_tint(1, 0, Some(Color::rgb(1.0, 0.0, 0.5))).unwrap();
        layer.set_ghost(0, 0, Some(TileRef::new(0, 3))).unwrap();
        layer.update(&atlases);

        let mesh = layer.mesh(0).unwrap();
        assert_eq!(mesh.attributes().triangle_opacity(0), 0.8);
        assert_eq!(mesh.attributes().triangle_opacity(1), 0.8);
        assert_eq!(mesh.attributes().triangle_color(0), NO_TINT.as_rgba_f32());
        assert_eq!(mesh.attributes().triangle_color(2), [1.0, 0.0, 0.5, 1.0]);
        assert_eq!(mesh.attributes().triangle_color(3), [1.0, 0.0, 0.5, 1.0]);
        assert_eq!(mesh.attributes().triangle_uvs(0), atlases[&0].tile_uvs(3)[0]);
    }

    #[test]
    fn cells_are_cleared_in_their_former_mesh() {
        let atlases = HashMap::from([(0, atlas()), (1, atlas())]);
        let mut layer = layer(2, 1);
        layer.set_cells(vec![TileRef::new(0, 1), TileRef::new(1, 2)]).unwrap();
        layer.update(&atlases);
        assert_eq!(layer.mesh_count(), 2);

        layer.set_tile(0, 0, TileRef::new(1, 3)).unwrap();
        let stats = layer.update(&atlases);

        // tileset 0 is gone, cell 0 moved over to tileset 1
        assert_eq!(stats.meshes_removed, 1);
        assert_eq!(layer.mesh_count(), 1);
        let mesh = layer.mesh(1).unwrap();
        for triangle in 0..4 {
            assert!(mesh.shows(triangle, layer.get_tile_by_index(triangle / 2).unwrap()));
        }
        assert_eq!(mesh.attributes().triangle_uvs(0), atlases[&1].tile_uvs(3)[0]);
    }

    #[test]
    fn switching_between_live_meshes_clears_the_old_one() {
        let atlases = HashMap::from([(0, atlas()), (1, atlas())]);
        let mut layer = layer(3, 1);
        layer
            .set_cells(vec![TileRef::new(0, 1), TileRef::new(0, 1), TileRef::new(1, 2)])
            .unwrap();
        layer.update(&atlases);

        layer.set_tile(1, 0, TileRef::new(1, 0)).unwrap();
        let stats = layer.update(&atlases);
        assert_eq!(stats.tiles_changed, 1);
        assert_eq!(stats.triangles_written, 2);
        assert_eq!(stats.triangles_cleared, 2);

        assert!(layer.mesh(0).unwrap().attributes().is_invisible(2));
        assert!(layer.mesh(0).unwrap().attributes().is_invisible(3));
        assert!(!layer.mesh(1).unwrap().attributes().is_invisible(2));
        assert!(!layer.mesh(0).unwrap().attributes().is_invisible(0));
    }

    #[test]
    fn missing_atlas_hides_mesh_until_loaded() {
        let mut atlases: HashMap<i32, TextureAtlas> = HashMap::new();
        let mut layer = layer(2, 2);
        layer.set_cells(vec![TileRef::new(4, 0); 4]).unwrap();

        let stats = layer.update(&atlases);
        assert_eq!(layer.mesh_count(), 1);
        assert_eq!(stats.meshes_hidden, 1);
        assert!(!layer.mesh(4).unwrap().is_visible());
        assert_eq!(stats.triangles_written, 0);

        // no atlas yet: nothing to do
        let stats = layer.update(&atlases);
        assert_eq!(stats.triangles_written + stats.triangles_cleared, 0);

        atlases.insert(4, atlas());
        let stats = layer.update(&atlases);
        let mesh = layer.mesh(4).unwrap();
        assert!(mesh.is_visible());
        assert!(mesh.texture().is_some());
        assert_eq!(stats.triangles_written, 8);
        assert_eq!(stats.meshes_hidden, 0);
    }

    #[test]
    fn upload_flag_is_taken_once() {
        let atlases = HashMap::from([(0, atlas())]);
        let mut layer = layer(2, 2);
        layer.set_cells(vec![TileRef::new(0, 0); 4]).unwrap();
        layer.update(&atlases);

        assert!(layer.meshes_mut().all(|m| m.take_needs_upload()));
        layer.update(&atlases);
        assert!(layer.meshes().all(|m| !m.needs_upload()));
    }

    #[test]
    fn invalidated_tileset_is_resolved_again() {
        let mut atlases = HashMap::from([(0, atlas())]);
        let mut layer = layer(1, 1);
        layer.set_cells(vec![TileRef::new(0, 1)]).unwrap();
        layer.update(&atlases);

        // atlas grew, same id now maps elsewhere
        atlases.insert(
            0,
            TextureAtlas::new(Handle::default(), vec2(64.0, 32.0), vec2(16.0, 16.0)).unwrap(),
        );
        assert_eq!(layer.update(&atlases).triangles_written, 0);

        layer.invalidate_tileset(0);
        assert_eq!(layer.update(&atlases).triangles_written, 2);
        assert_eq!(
            layer.mesh(0).unwrap().attributes().triangle_uvs(1),
            atlases[&0].tile_uvs(1)[1]
        );
    }

    #[test]
    fn mesh_conversion_carries_attributes() {
        let atlases = HashMap::from([(0, atlas())]);
        let mut layer = layer(2, 2);
        layer.set_cells(vec![TileRef::new(0, 0); 4]).unwrap();
        layer.update(&atlases);

        let mesh = layer.mesh(0).unwrap().to_mesh();
        assert_eq!(mesh.count_vertices(), 24);
        let Some(bevy::render::mesh::VertexAttributeValues::Float32x2(uvs)) =
            mesh.attribute(Mesh::ATTRIBUTE_UV_0)
        else {
            panic!("uv attribute missing");
        };
        assert_eq!(uvs[0], atlases[&0].tile_uvs(0)[0][0].to_array());
    }
}
