// src/props/instancing/mesh.rs
//! CPU-side mesh building for detail templates.
//! One merged mesh per template; every chunk entity of a layer shares it.

use bevy::prelude::*;
use bevy::render::mesh::{Indices, VertexAttributeValues};
use bevy::render::render_asset::RenderAssetUsages;
use bevy::render::render_resource::PrimitiveTopology;

use super::template::InstanceBatchTemplate;

/// Two crossed unit quads standing on Y=0, the usual grass card.
pub fn grass_card_mesh() -> Mesh {
    let h = 0.5;
    let positions: Vec<[f32; 3]> = vec![
        // quad along X
        [-h, 0.0, 0.0], [h, 0.0, 0.0], [h, 1.0, 0.0], [-h, 1.0, 0.0],
        // quad along Z
        [0.0, 0.0, -h], [0.0, 0.0, h], [0.0, 1.0, h], [0.0, 1.0, -h],
    ];
    let uvs: Vec<[f32; 2]> = vec![
        [0.0, 1.0], [1.0, 1.0], [1.0, 0.0], [0.0, 0.0],
        [0.0, 1.0], [1.0, 1.0], [1.0, 0.0], [0.0, 0.0],
    ];
    let indices: Vec<u32> = vec![0, 1, 2, 0, 2, 3, 4, 5, 6, 4, 6, 7];

    let mut mesh = Mesh::new(PrimitiveTopology::TriangleList, RenderAssetUsages::default());
    mesh.insert_attribute(Mesh::ATTRIBUTE_POSITION, positions);
    mesh.insert_attribute(Mesh::ATTRIBUTE_UV_0, uvs);
    mesh.insert_indices(Indices::U32(indices));
    mesh
}

/// Bake `src` once per template instance into a single mesh.
/// Keeps UVs, drops normals (detail material is unlit), writes the instance
/// color as a vertex color and the instance's chunk-local XZ anchor as `UV_1`.
/// The detail vertex shader grounds and sways each card around that anchor.
pub fn merge_template_mesh(src: &Mesh, template: &InstanceBatchTemplate) -> Option<Mesh> {
    let positions: Vec<[f32; 3]> = match src.attribute(Mesh::ATTRIBUTE_POSITION)? {
        VertexAttributeValues::Float32x3(v) => v.clone(),
        _ => return None,
    };

    let uvs: Option<Vec<[f32; 2]>> = src
        .attribute(Mesh::ATTRIBUTE_UV_0)
        .and_then(|vals| match vals {
            VertexAttributeValues::Float32x2(v) => Some(v.clone()),
            _ => None,
        });

    let src_indices: Option<Vec<u32>> = match src.indices() {
        Some(Indices::U32(v)) => Some(v.clone()),
        Some(Indices::U16(v)) => Some(v.iter().map(|&x| x as u32).collect()),
        None => None,
    };

    let src_vtx = positions.len();
    let inst_n = template.len();

    let mut out_positions = Vec::with_capacity(src_vtx * inst_n);
    let mut out_colors: Vec<[f32; 4]> = Vec::with_capacity(src_vtx * inst_n);
    let mut out_anchors: Vec<[f32; 2]> = Vec::with_capacity(src_vtx * inst_n);
    let mut out_uvs: Option<Vec<[f32; 2]>> = uvs.as_ref().map(|_| Vec::with_capacity(src_vtx * inst_n));
    let mut out_indices: Vec<u32> =
        Vec::with_capacity(src_indices.as_ref().map(|ix| ix.len()).unwrap_or(0) * inst_n);

    for (inst_id, inst) in template.instances().iter().enumerate() {
        let trs = inst.transform().compute_matrix();
        let c = inst.color.to_linear();
        let color = [c.red, c.green, c.blue, c.alpha];
        let anchor = [inst.translation.x, inst.translation.z];

        for (i, p) in positions.iter().enumerate() {
            let wp = trs.transform_point3(Vec3::from_array(*p));
            out_positions.push(wp.to_array());
            out_colors.push(color);
            out_anchors.push(anchor);

            if let (Some(src_uv), Some(dst_uv)) = (uvs.as_ref(), out_uvs.as_mut()) {
                dst_uv.push(src_uv[i]);
            }
        }

        if let Some(ix) = &src_indices {
            let base = (inst_id * src_vtx) as u32;
            out_indices.extend(ix.iter().map(|&i| i + base));
        }
    }

    let mut mesh = Mesh::new(PrimitiveTopology::TriangleList, RenderAssetUsages::default());
    mesh.insert_attribute(Mesh::ATTRIBUTE_POSITION, out_positions);
    mesh.insert_attribute(Mesh::ATTRIBUTE_COLOR, out_colors);
    mesh.insert_attribute(Mesh::ATTRIBUTE_UV_1, out_anchors);
    if let Some(uv) = out_uvs {
        mesh.insert_attribute(Mesh::ATTRIBUTE_UV_0, uv);
    }
    if src_indices.is_some() {
        mesh.insert_indices(Indices::U32(out_indices));
    }
    Some(mesh)
}
