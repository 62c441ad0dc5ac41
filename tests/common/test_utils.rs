use std::{collections::HashMap, sync::Mutex, time::Duration};

use anyhow::Context as _;
use cab_viewer::resources::AssetSource;
use log::{Level, LevelFilter, Log, Metadata, Record};

/// Serves assets from memory; anything not inserted is a fetch error.
#[derive(Default)]
pub struct MemorySource {
    files: HashMap<String, Vec<u8>>,
}

impl MemorySource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, path: &str, bytes: impl Into<Vec<u8>>) -> Self {
        self.files.insert(path.to_string(), bytes.into());
        self
    }
}

impl AssetSource for MemorySource {
    async fn fetch(&self, path: &str) -> anyhow::Result<Vec<u8>> {
        self.files.get(path).cloned().with_context(|| format!("{path} not found"))
    }
}

/// Wraps a [`MemorySource`], holding back one path for `delay`.
pub struct DelayedSource {
    inner: MemorySource,
    slow: String,
    delay: Duration,
}

impl DelayedSource {
    pub fn new(inner: MemorySource, slow: &str, delay: Duration) -> Self {
        Self {
            inner,
            slow: slow.to_string(),
            delay,
        }
    }
}

impl AssetSource for DelayedSource {
    async fn fetch(&self, path: &str) -> anyhow::Result<Vec<u8>> {
        if path == self.slow {
            tokio::time::sleep(self.delay).await;
        }
        self.inner.fetch(path).await
    }
}

/// Keeps every log record of the test binary in memory.
pub struct CapturedLogs {
    records: Mutex<Vec<(Level, String)>>,
}

static LOGS: CapturedLogs = CapturedLogs {
    records: Mutex::new(Vec::new()),
};

impl Log for CapturedLogs {
    fn enabled(&self, _: &Metadata) -> bool {
        true
    }

    fn log(&self, record: &Record) {
        if let Ok(mut records) = self.records.lock() {
            records.push((record.level(), record.args().to_string()));
        }
    }

    fn flush(&self) {}
}

impl CapturedLogs {
    /// Whether a record at `level` mentioning `needle` was logged.
    pub fn contains(&self, level: Level, needle: &str) -> bool {
        self.records
            .lock()
            .map(|records| records.iter().any(|(l, message)| *l == level && message.contains(needle)))
            .unwrap_or(false)
    }
}

/// Installs the capturing logger; later calls reuse it.
pub fn capture_logs() -> &'static CapturedLogs {
    if log::set_logger(&LOGS).is_ok() {
        log::set_max_level(LevelFilter::Trace);
    }
    &LOGS
}

/// Length of the animation built by [`TestModel::animate`], in seconds.
pub const CLIP_SECONDS: f32 = 3.0;

/// How far [`TestModel::animate`] slides its node along x.
pub const CLIP_TRAVEL: f32 = 1.0;

/**
 * Binary buffer shared by every test model: a unit quad in the XY plane facing
 * +Z (positions, then u16 indices) followed by a two key translation track.
 */
pub fn quad_bin() -> Vec<u8> {
    let positions: [f32; 12] = [-0.5, -0.5, 0.0, 0.5, -0.5, 0.0, 0.5, 0.5, 0.0, -0.5, 0.5, 0.0];
    let indices: [u16; 6] = [0, 1, 2, 0, 2, 3];
    let times: [f32; 2] = [0.0, CLIP_SECONDS];
    let translations: [f32; 6] = [0.0, 0.0, 0.0, CLIP_TRAVEL, 0.0, 0.0];

    let mut bin = Vec::with_capacity(92);
    positions.iter().for_each(|v| bin.extend_from_slice(&v.to_le_bytes()));
    indices.iter().for_each(|v| bin.extend_from_slice(&v.to_le_bytes()));
    times.iter().for_each(|v| bin.extend_from_slice(&v.to_le_bytes()));
    translations.iter().for_each(|v| bin.extend_from_slice(&v.to_le_bytes()));
    bin
}

struct TestNode {
    name: String,
    material: Option<String>,
    children: Vec<usize>,
}

/// Writes small `.gltf` documents over [`quad_bin`].
pub struct TestModel {
    bin_uri: String,
    nodes: Vec<TestNode>,
    animated: Option<usize>,
}

impl TestModel {
    pub fn new(bin_uri: &str) -> Self {
        Self {
            bin_uri: bin_uri.to_string(),
            nodes: Vec::new(),
            animated: None,
        }
    }

    /// Adds a node; nodes with a material carry the quad.
    pub fn node(mut self, name: &str, material: Option<&str>, children: &[usize]) -> Self {
        self.nodes.push(TestNode {
            name: name.to_string(),
            material: material.map(str::to_string),
            children: children.to_vec(),
        });
        self
    }

    /// Adds an "Open" clip sliding `node` by [`CLIP_TRAVEL`] over [`CLIP_SECONDS`].
    pub fn animate(mut self, node: usize) -> Self {
        self.animated = Some(node);
        self
    }

    pub fn json(&self) -> String {
        let mut materials: Vec<&str> = Vec::new();
        for name in self.nodes.iter().filter_map(|n| n.material.as_deref()) {
            if !materials.contains(&name) {
                materials.push(name);
            }
        }

        let mut meshes = Vec::new();
        let nodes: Vec<String> = self
            .nodes
            .iter()
            .map(|node| {
                let mut fields = vec![format!("\"name\":\"{}\"", node.name)];
                if let Some(material) = &node.material {
                    let index = materials.iter().position(|m| m == material).unwrap_or_default();
                    fields.push(format!("\"mesh\":{}", meshes.len()));
                    meshes.push(format!(
                        "{{\"name\":\"{}\",\"primitives\":[{{\"attributes\":{{\"POSITION\":0}},\"indices\":1,\"material\":{index}}}]}}",
                        node.name
                    ));
                }
                if !node.children.is_empty() {
                    fields.push(format!("\"children\":{}", list(&node.children)));
                }
                format!("{{{}}}", fields.join(","))
            })
            .collect();

        let roots: Vec<usize> = (0..self.nodes.len())
            .filter(|i| !self.nodes.iter().any(|n| n.children.contains(i)))
            .collect();

        let materials: Vec<String> = materials
            .iter()
            .map(|name| format!("{{\"name\":\"{name}\",\"pbrMetallicRoughness\":{{\"baseColorFactor\":[1,1,1,1]}}}}"))
            .collect();

        let animations = match self.animated {
            Some(node) => format!(
                ",\"animations\":[{{\"name\":\"Open\",\"channels\":[{{\"sampler\":0,\"target\":{{\"node\":{node},\"path\":\"translation\"}}}}],\"samplers\":[{{\"input\":2,\"output\":3,\"interpolation\":\"LINEAR\"}}]}}]"
            ),
            None => String::new(),
        };

        format!(
            concat!(
                "{{\"asset\":{{\"version\":\"2.0\"}},",
                "\"scene\":0,\"scenes\":[{{\"nodes\":{roots}}}],",
                "\"nodes\":[{nodes}],",
                "\"meshes\":[{meshes}],",
                "\"materials\":[{materials}],",
                "\"buffers\":[{{\"uri\":\"{bin}\",\"byteLength\":92}}],",
                "\"bufferViews\":[",
                "{{\"buffer\":0,\"byteOffset\":0,\"byteLength\":48}},",
                "{{\"buffer\":0,\"byteOffset\":48,\"byteLength\":12}},",
                "{{\"buffer\":0,\"byteOffset\":60,\"byteLength\":8}},",
                "{{\"buffer\":0,\"byteOffset\":68,\"byteLength\":24}}],",
                "\"accessors\":[",
                "{{\"bufferView\":0,\"componentType\":5126,\"count\":4,\"type\":\"VEC3\",\"min\":[-0.5,-0.5,0],\"max\":[0.5,0.5,0]}},",
                "{{\"bufferView\":1,\"componentType\":5123,\"count\":6,\"type\":\"SCALAR\"}},",
                "{{\"bufferView\":2,\"componentType\":5126,\"count\":2,\"type\":\"SCALAR\",\"min\":[0],\"max\":[{seconds}]}},",
                "{{\"bufferView\":3,\"componentType\":5126,\"count\":2,\"type\":\"VEC3\"}}]",
                "{animations}}}"
            ),
            roots = list(&roots),
            nodes = nodes.join(","),
            meshes = meshes.join(","),
            materials = materials.join(","),
            bin = self.bin_uri,
            seconds = CLIP_SECONDS,
            animations = animations,
        )
    }
}

fn list(items: &[usize]) -> String {
    let items: Vec<String> = items.iter().map(usize::to_string).collect();
    format!("[{}]", items.join(","))
}

/// A door whose panel slides open and whose button carries the indicator material.
pub fn door_model() -> TestModel {
    TestModel::new("quad.bin")
        .node("Door", Some("Door_Panel"), &[1])
        .node("Door_Button_1", Some("M_Light_Door"), &[])
        .animate(0)
}

/// A static body part with a glass pane.
pub fn body_model() -> TestModel {
    TestModel::new("quad.bin")
        .node("Body", Some("Body_Paint"), &[1])
        .node("Window", Some("EX_Window"), &[])
}

/// Serves the door and body models under `base`, plus their shared buffer.
pub fn cab_source(base: &str) -> MemorySource {
    MemorySource::new()
        .with(&format!("{base}door.gltf"), door_model().json())
        .with(&format!("{base}body.gltf"), body_model().json())
        .with(&format!("{base}quad.bin"), quad_bin())
}
