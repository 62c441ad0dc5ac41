use log::warn;

use crate::data_structures::scene_graph::{MaterialId, MaterialSlot, Mesh, Primitive};

/**
 * Reads the triangle primitives of a glTF mesh into CPU-side geometry.
 *
 * Material ids are indices into the document's material list; primitives
 * without a material get `default_material`. The loader remaps both to scene
 * materials when the part is attached.
 */
pub fn read_mesh(mesh: gltf::Mesh, buffers: &[Vec<u8>], default_material: MaterialId) -> Mesh {
    let primitives = mesh
        .primitives()
        .filter_map(|primitive| {
            if primitive.mode() != gltf::mesh::Mode::Triangles {
                warn!(
                    "Skipping primitive {} of mesh {:?}: mode {:?} is not supported",
                    primitive.index(),
                    mesh.name(),
                    primitive.mode()
                );
                return None;
            }
            let reader = primitive.reader(|buffer| buffers.get(buffer.index()).map(Vec::as_slice));

            let positions: Vec<[f32; 3]> = reader.read_positions()?.collect();
            let normals: Vec<[f32; 3]> = match reader.read_normals() {
                Some(normals) => normals.collect(),
                None => vec![[0.0, 1.0, 0.0]; positions.len()],
            };
            let tex_coords: Vec<[f32; 2]> = match reader.read_tex_coords(0) {
                Some(tex_coords) => tex_coords.into_f32().collect(),
                None => vec![[0.0, 0.0]; positions.len()],
            };
            let indices: Vec<u32> = match reader.read_indices() {
                Some(indices) => indices.into_u32().collect(),
                None => (0..positions.len() as u32).collect(),
            };
            let material = primitive
                .material()
                .index()
                .map(MaterialId)
                .unwrap_or(default_material);

            Some(Primitive::new(
                positions,
                normals,
                tex_coords,
                indices,
                MaterialSlot::Single(material),
            ))
        })
        .collect();

    Mesh {
        name: mesh.name().map(str::to_string),
        primitives,
    }
}
