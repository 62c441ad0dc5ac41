use std::{future::Future, sync::Arc};

use anyhow::Context;

use crate::{
    data_structures::{
        instance::Instance,
        material::{Color, Material, Side, TextureId},
        scene_graph::{MaterialId, Mesh},
    },
    resources::animation::AnimationClip,
};

/**
 * This module contains all logic for loading meshes, textures and animations from external files.
 */
pub mod animation;
pub mod loader;
pub mod mesh;
pub mod texture;

/// Where asset bytes come from: the file system natively, HTTP in the browser.
pub trait AssetSource {
    fn fetch(&self, path: &str) -> impl Future<Output = anyhow::Result<Vec<u8>>>;
}

/// Reads assets below a root directory.
#[cfg(not(target_arch = "wasm32"))]
#[derive(Clone, Debug)]
pub struct FileSource {
    root: std::path::PathBuf,
}

#[cfg(not(target_arch = "wasm32"))]
impl FileSource {
    pub fn new(root: impl Into<std::path::PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

#[cfg(not(target_arch = "wasm32"))]
impl Default for FileSource {
    fn default() -> Self {
        Self::new("./")
    }
}

#[cfg(not(target_arch = "wasm32"))]
impl AssetSource for FileSource {
    async fn fetch(&self, path: &str) -> anyhow::Result<Vec<u8>> {
        let path = self.root.join(path);
        tokio::fs::read(&path)
            .await
            .with_context(|| format!("Could not read {}", path.display()))
    }
}

/// Fetches assets relative to the page origin.
#[cfg(target_arch = "wasm32")]
#[derive(Clone, Debug, Default)]
pub struct HttpSource;

#[cfg(target_arch = "wasm32")]
impl HttpSource {
    fn format_url(file_name: &str) -> anyhow::Result<reqwest::Url> {
        let window = web_sys::window().context("No window available")?;
        let origin = window
            .location()
            .origin()
            .map_err(|e| anyhow::anyhow!("No page origin: {e:?}"))?;
        let base = reqwest::Url::parse(&format!("{origin}/"))?;
        Ok(base.join(file_name)?)
    }
}

#[cfg(target_arch = "wasm32")]
impl AssetSource for HttpSource {
    async fn fetch(&self, path: &str) -> anyhow::Result<Vec<u8>> {
        let url = Self::format_url(path)?;
        let response = reqwest::get(url.clone())
            .await
            .with_context(|| format!("Could not fetch {url}"))?
            .error_for_status()?;
        Ok(response.bytes().await?.to_vec())
    }
}

/// One node of a parsed glTF document.
#[derive(Clone, Debug)]
pub struct GltfNode {
    pub name: Option<String>,
    pub transform: Instance,
    pub mesh: Option<Mesh>,
    pub children: Vec<usize>,
}

/// A glTF document parsed into CPU-side data, not yet part of any scene.
///
/// Node, material and image ids are local to the document. Materials get
/// one extra trailing entry used by primitives that reference none.
#[derive(Clone, Debug)]
pub struct GltfAsset {
    pub path: String,
    pub nodes: Vec<GltfNode>,
    pub roots: Vec<usize>,
    pub materials: Vec<Material>,
    pub images: Vec<Arc<image::RgbaImage>>,
    pub clips: Vec<AnimationClip>,
}

fn directory_of(path: &str) -> &str {
    match path.rfind('/') {
        Some(i) => &path[..=i],
        None => "",
    }
}

fn read_material(material: gltf::Material) -> Material {
    let pbr = material.pbr_metallic_roughness();
    let image_of = |texture: gltf::Texture| TextureId(texture.source().index());
    let [r, g, b] = material.emissive_factor();
    let mut out = Material::new(material.name().unwrap_or_default());
    out.base_color = pbr.base_color_factor();
    out.base_color_texture = pbr.base_color_texture().map(|info| image_of(info.texture()));
    out.normal_texture = material.normal_texture().map(|info| image_of(info.texture()));
    out.roughness = pbr.roughness_factor();
    out.metalness = pbr.metallic_factor();
    out.emissive = Color::rgb(r, g, b);
    out.transparent = material.alpha_mode() == gltf::material::AlphaMode::Blend;
    if material.double_sided() {
        out.side = Side::Double;
    }
    out
}

/// Fetches and parses a `.gltf` or `.glb` file including its buffers, images and animations.
pub async fn load_model_gltf<S: AssetSource>(source: &S, file_name: &str) -> anyhow::Result<GltfAsset> {
    let bytes = source.fetch(file_name).await?;
    let gltf = gltf::Gltf::from_slice(&bytes).with_context(|| format!("Could not parse {file_name}"))?;
    let base = directory_of(file_name);

    // Load buffers
    let mut buffers = Vec::new();
    for buffer in gltf.buffers() {
        match buffer.source() {
            gltf::buffer::Source::Bin => {
                let blob = gltf
                    .blob
                    .as_deref()
                    .with_context(|| format!("{file_name} references a binary chunk it does not have"))?;
                buffers.push(blob.to_vec());
            }
            gltf::buffer::Source::Uri(uri) if uri.starts_with("data:") => {
                anyhow::bail!("{file_name}: data URI buffers are not supported");
            }
            gltf::buffer::Source::Uri(uri) => {
                buffers.push(source.fetch(&format!("{base}{uri}")).await?);
            }
        }
    }

    let images = texture::load_images(source, &gltf.document, &buffers, base).await?;

    let mut materials: Vec<Material> = gltf.materials().map(read_material).collect();
    let default_material = MaterialId(materials.len());
    materials.push(Material::new(""));

    let nodes = gltf
        .nodes()
        .map(|node| {
            let (translation, rotation, scale) = node.transform().decomposed();
            let [x, y, z, w] = rotation;
            GltfNode {
                name: node.name().map(str::to_string),
                transform: Instance {
                    position: translation.into(),
                    rotation: cgmath::Quaternion::new(w, x, y, z),
                    scale: scale.into(),
                },
                mesh: node.mesh().map(|m| mesh::read_mesh(m, &buffers, default_material)),
                children: node.children().map(|c| c.index()).collect(),
            }
        })
        .collect();

    let roots = match gltf.default_scene().or_else(|| gltf.scenes().next()) {
        Some(scene) => scene.nodes().map(|n| n.index()).collect(),
        None => Vec::new(),
    };

    let clips = animation::read_animations(&gltf.document, &buffers);

    Ok(GltfAsset {
        path: file_name.to_string(),
        nodes,
        roots,
        materials,
        images,
        clips,
    })
}
