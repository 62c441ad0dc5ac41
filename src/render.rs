//! GPU mirror of the scene graph.
//!
//! [`SceneRenderer`] uploads every mesh primitive, texture and material of a
//! [`Scene`] once per scene generation. Transforms and material uniforms are
//! rewritten each frame so animations, indicator emission and the button panel
//! show up without a rebuild. Opaque materials draw first, translucent ones
//! after them with depth writes off.

use std::{collections::HashMap, ops::Range};

use wgpu::{RenderPass, util::DeviceExt};

use crate::{
    context::Context,
    data_structures::{
        material::{Material, TextureId},
        scene_graph::{MaterialId, MaterialSlot, NodeId, Scene},
        texture::Texture,
    },
    pipelines::{basic::mk_basic_pipeline, transparent::mk_transparent_pipeline},
};

pub trait Vertex {
    fn desc() -> wgpu::VertexBufferLayout<'static>;
}

#[repr(C)]
#[derive(Copy, Clone, Debug, bytemuck::Pod, bytemuck::Zeroable)]
pub struct ModelVertex {
    pub position: [f32; 3],
    pub tex_coords: [f32; 2],
    pub normal: [f32; 3],
}

impl Vertex for ModelVertex {
    fn desc() -> wgpu::VertexBufferLayout<'static> {
        use std::mem;
        wgpu::VertexBufferLayout {
            array_stride: mem::size_of::<ModelVertex>() as wgpu::BufferAddress,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes: &[
                wgpu::VertexAttribute {
                    offset: 0,
                    shader_location: 0,
                    format: wgpu::VertexFormat::Float32x3,
                },
                wgpu::VertexAttribute {
                    offset: mem::size_of::<[f32; 3]>() as wgpu::BufferAddress,
                    shader_location: 1,
                    format: wgpu::VertexFormat::Float32x2,
                },
                wgpu::VertexAttribute {
                    offset: mem::size_of::<[f32; 5]>() as wgpu::BufferAddress,
                    shader_location: 2,
                    format: wgpu::VertexFormat::Float32x3,
                },
            ],
        }
    }
}

#[repr(C)]
#[derive(Copy, Clone, Debug, bytemuck::Pod, bytemuck::Zeroable)]
pub struct MaterialUniform {
    base_color: [f32; 4],
    emissive: [f32; 3],
    emissive_intensity: f32,
    roughness: f32,
    metalness: f32,
    opacity: f32,
    _padding: f32,
}

impl From<&Material> for MaterialUniform {
    fn from(material: &Material) -> Self {
        Self {
            base_color: material.base_color,
            emissive: material.emissive.to_array(),
            emissive_intensity: material.emissive_intensity,
            roughness: material.roughness,
            metalness: material.metalness,
            opacity: material.opacity,
            _padding: 0.0,
        }
    }
}

struct GpuMaterial {
    buffer: wgpu::Buffer,
    bind_group: wgpu::BindGroup,
}

struct GpuPrimitive {
    node: NodeId,
    vertex: wgpu::Buffer,
    index: wgpu::Buffer,
    groups: Vec<(Range<u32>, MaterialId)>,
}

pub struct SceneRenderer {
    opaque: wgpu::RenderPipeline,
    transparent: wgpu::RenderPipeline,
    material_layout: wgpu::BindGroupLayout,
    white: Texture,
    textures: Vec<Texture>,
    materials: Vec<GpuMaterial>,
    primitives: Vec<GpuPrimitive>,
    instances: HashMap<NodeId, wgpu::Buffer>,
    generation: Option<u64>,
}

fn mk_material_layout(device: &wgpu::Device) -> wgpu::BindGroupLayout {
    device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
        entries: &[
            wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::FRAGMENT,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Uniform,
                    has_dynamic_offset: false,
                    min_binding_size: None,
                },
                count: None,
            },
            wgpu::BindGroupLayoutEntry {
                binding: 1,
                visibility: wgpu::ShaderStages::FRAGMENT,
                ty: wgpu::BindingType::Texture {
                    multisampled: false,
                    view_dimension: wgpu::TextureViewDimension::D2,
                    sample_type: wgpu::TextureSampleType::Float { filterable: true },
                },
                count: None,
            },
            wgpu::BindGroupLayoutEntry {
                binding: 2,
                visibility: wgpu::ShaderStages::FRAGMENT,
                ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                count: None,
            },
        ],
        label: Some("material_bind_group_layout"),
    })
}

impl SceneRenderer {
    pub fn new(ctx: &Context) -> Self {
        let material_layout = mk_material_layout(&ctx.device);
        let layouts = [&ctx.camera.bind_group_layout, &ctx.light.bind_group_layout, &material_layout];
        let opaque = mk_basic_pipeline(&ctx.device, &ctx.config, &layouts);
        let transparent = mk_transparent_pipeline(&ctx.device, &ctx.config, &layouts);
        let white = Texture::white(&ctx.device, &ctx.queue);
        Self {
            opaque,
            transparent,
            material_layout,
            white,
            textures: Vec::new(),
            materials: Vec::new(),
            primitives: Vec::new(),
            instances: HashMap::new(),
            generation: None,
        }
    }

    /// Brings the GPU copy up to date. Structure is re-uploaded only when the scene generation moved.
    pub fn sync(&mut self, ctx: &Context, scene: &Scene) {
        if self.generation != Some(scene.generation()) {
            self.rebuild(ctx, scene);
        }
        for (material, gpu) in scene.materials().iter().zip(&self.materials) {
            ctx.queue
                .write_buffer(&gpu.buffer, 0, bytemuck::cast_slice(&[MaterialUniform::from(material)]));
        }
        for (node, buffer) in &self.instances {
            if let Some(node) = scene.node(*node) {
                ctx.queue.write_buffer(buffer, 0, bytemuck::cast_slice(&[node.world().to_raw()]));
            }
        }
    }

    fn rebuild(&mut self, ctx: &Context, scene: &Scene) {
        let device = &ctx.device;
        log::debug!("Rebuilding GPU scene for generation {}", scene.generation());

        self.textures = (0..)
            .map_while(|index| scene.texture(TextureId(index)))
            .enumerate()
            .map(|(index, image)| {
                Texture::from_rgba(device, &ctx.queue, image.as_ref(), Some(format!("texture {index}").as_str()))
            })
            .collect();

        self.materials = scene
            .materials()
            .iter()
            .map(|material| {
                let buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
                    label: Some(material.name.as_str()),
                    contents: bytemuck::cast_slice(&[MaterialUniform::from(material)]),
                    usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
                });
                let texture = material
                    .base_color_texture
                    .and_then(|id| self.textures.get(id.0))
                    .unwrap_or(&self.white);
                let sampler = texture.sampler.as_ref().or(self.white.sampler.as_ref());
                let mut entries = vec![
                    wgpu::BindGroupEntry {
                        binding: 0,
                        resource: buffer.as_entire_binding(),
                    },
                    wgpu::BindGroupEntry {
                        binding: 1,
                        resource: wgpu::BindingResource::TextureView(&texture.view),
                    },
                ];
                if let Some(sampler) = sampler {
                    entries.push(wgpu::BindGroupEntry {
                        binding: 2,
                        resource: wgpu::BindingResource::Sampler(sampler),
                    });
                }
                let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
                    layout: &self.material_layout,
                    entries: &entries,
                    label: Some(material.name.as_str()),
                });
                GpuMaterial { buffer, bind_group }
            })
            .collect();

        self.primitives.clear();
        self.instances.clear();
        for (id, node) in scene.nodes() {
            let Some(mesh) = &node.mesh else { continue };
            for primitive in &mesh.primitives {
                let vertices = primitive
                    .positions
                    .iter()
                    .enumerate()
                    .map(|(i, position)| ModelVertex {
                        position: *position,
                        tex_coords: primitive.tex_coords.get(i).copied().unwrap_or_default(),
                        normal: primitive.normals.get(i).copied().unwrap_or([0.0, 1.0, 0.0]),
                    })
                    .collect::<Vec<_>>();
                let vertex = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
                    label: Some("Vertex Buffer"),
                    contents: bytemuck::cast_slice(&vertices),
                    usage: wgpu::BufferUsages::VERTEX,
                });
                let index = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
                    label: Some("Index Buffer"),
                    contents: bytemuck::cast_slice(&primitive.indices),
                    usage: wgpu::BufferUsages::INDEX,
                });
                let groups = match &primitive.material {
                    MaterialSlot::Single(material) => vec![(0..primitive.indices.len() as u32, *material)],
                    MaterialSlot::Multi(groups) => groups.iter().map(|g| (g.range.clone(), g.material)).collect(),
                };
                self.primitives.push(GpuPrimitive {
                    node: id,
                    vertex,
                    index,
                    groups,
                });
            }
            self.instances.insert(
                id,
                device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
                    label: Some("Instance Buffer"),
                    contents: bytemuck::cast_slice(&[node.world().to_raw()]),
                    usage: wgpu::BufferUsages::VERTEX | wgpu::BufferUsages::COPY_DST,
                }),
            );
        }
        self.generation = Some(scene.generation());
    }

    /// Records the opaque batch followed by the translucent batch.
    pub fn draw(&self, render_pass: &mut RenderPass, ctx: &Context, scene: &Scene) {
        render_pass.set_bind_group(0, &ctx.camera.bind_group, &[]);
        render_pass.set_bind_group(1, &ctx.light.bind_group, &[]);
        for (pipeline, translucent) in [(&self.opaque, false), (&self.transparent, true)] {
            render_pass.set_pipeline(pipeline);
            for primitive in &self.primitives {
                let Some(instance) = self.instances.get(&primitive.node) else { continue };
                render_pass.set_vertex_buffer(0, primitive.vertex.slice(..));
                render_pass.set_vertex_buffer(1, instance.slice(..));
                render_pass.set_index_buffer(primitive.index.slice(..), wgpu::IndexFormat::Uint32);
                for (range, material) in &primitive.groups {
                    let Some(gpu) = self.materials.get(material.0) else { continue };
                    let is_translucent = scene.material(*material).is_some_and(Material::is_translucent);
                    if is_translucent != translucent {
                        continue;
                    }
                    render_pass.set_bind_group(2, &gpu.bind_group, &[]);
                    render_pass.draw_indexed(range.clone(), 0, 0..1);
                }
            }
        }
    }
}
