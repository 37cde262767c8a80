//! # Proxy Shapes
//!
//! 3-D stand-ins attached to the vertices of network nodes: either meshes
//! imported from the asset files a node's content references, or a
//! generated unit cube.
//!
//! Import failures are never fatal. [`AssetImporter::load_models_combined`]
//! returns every failure next to whatever could be imported, and the caller
//! turns them into warnings.

use crate::geometry::GeometryModel;
use crate::{BinderyError, GeometryId, Vec3};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

// =============================================================================
// PROXY MESH
// =============================================================================

/// Where a proxy's mesh came from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProxySource {
    /// The generated default cube.
    Cube,
    /// Combined from these asset files.
    Imported { files: Vec<String> },
}

/// Mesh data carried by a proxy shape.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProxyMesh {
    pub source: ProxySource,
    pub bounds_min: Vec3,
    pub bounds_max: Vec3,
    pub vertex_count: usize,
}

impl ProxyMesh {
    /// A unit cube centred on the origin.
    #[must_use]
    pub fn cube() -> Self {
        Self {
            source: ProxySource::Cube,
            bounds_min: Vec3::new(-0.5, -0.5, -0.5),
            bounds_max: Vec3::new(0.5, 0.5, 0.5),
            vertex_count: 8,
        }
    }

    #[must_use]
    pub fn is_cube(&self) -> bool {
        self.source == ProxySource::Cube
    }

    /// Merge another mesh into this one.
    fn combine(mut self, other: Self) -> Self {
        let mut files = match self.source {
            ProxySource::Imported { files } => files,
            ProxySource::Cube => Vec::new(),
        };
        if let ProxySource::Imported { files: more } = other.source {
            files.extend(more);
        }
        self.source = ProxySource::Imported { files };
        self.bounds_min = Vec3::new(
            self.bounds_min.x.min(other.bounds_min.x),
            self.bounds_min.y.min(other.bounds_min.y),
            self.bounds_min.z.min(other.bounds_min.z),
        );
        self.bounds_max = Vec3::new(
            self.bounds_max.x.max(other.bounds_max.x),
            self.bounds_max.y.max(other.bounds_max.y),
            self.bounds_max.z.max(other.bounds_max.z),
        );
        self.vertex_count = self.vertex_count.saturating_add(other.vertex_count);
        self
    }
}

// =============================================================================
// IMPORTER
// =============================================================================

/// Result of importing several asset files into one proxy.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ImportOutcome {
    /// Combined mesh of every file that imported, if any did.
    pub mesh: Option<ProxyMesh>,
    /// One entry per file that failed.
    pub failures: Vec<BinderyError>,
}

/// Imports 3-D asset files as proxy meshes.
pub trait AssetImporter {
    /// Whether the file looks like a supported 3-D asset.
    fn is_recognized(&self, file: &str) -> bool;

    /// Import one file.
    fn load_model(&self, file: &str) -> Result<ProxyMesh, BinderyError>;

    /// Import several files and merge them into one mesh.
    fn load_models_combined(&self, files: &[String]) -> ImportOutcome {
        let mut outcome = ImportOutcome::default();
        for file in files {
            match self.load_model(file) {
                Ok(mesh) => {
                    outcome.mesh = Some(match outcome.mesh.take() {
                        Some(combined) => combined.combine(mesh),
                        None => mesh,
                    });
                }
                Err(error) => outcome.failures.push(error),
            }
        }
        outcome
    }

    /// The default proxy used when nothing could be imported.
    fn generate_cube(&self) -> ProxyMesh {
        ProxyMesh::cube()
    }
}

/// Imports assets from the filesystem.
///
/// Wavefront OBJ files are parsed for their vertex positions; other
/// recognised formats are accepted as opaque, non-empty files.
#[derive(Debug, Clone)]
pub struct FsAssetImporter {
    root: Option<PathBuf>,
    extensions: Vec<String>,
}

impl FsAssetImporter {
    #[must_use]
    pub fn new(root: Option<PathBuf>, extensions: &[String]) -> Self {
        Self {
            root,
            extensions: extensions.iter().map(|e| e.to_ascii_lowercase()).collect(),
        }
    }

    fn resolve(&self, file: &str) -> PathBuf {
        match &self.root {
            Some(root) => root.join(file),
            None => PathBuf::from(file),
        }
    }

    fn extension(file: &str) -> Option<String> {
        Path::new(file)
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase)
    }
}

impl AssetImporter for FsAssetImporter {
    fn is_recognized(&self, file: &str) -> bool {
        Self::extension(file).is_some_and(|ext| self.extensions.contains(&ext))
    }

    fn load_model(&self, file: &str) -> Result<ProxyMesh, BinderyError> {
        let path = self.resolve(file);
        if !path.is_file() {
            return Err(BinderyError::FileNotFound(file.to_string()));
        }
        let bytes = std::fs::read(&path).map_err(|e| BinderyError::ImportFailed {
            file: file.to_string(),
            reason: e.to_string(),
        })?;
        if bytes.is_empty() {
            return Err(BinderyError::ImportFailed {
                file: file.to_string(),
                reason: "file is empty".to_string(),
            });
        }

        if Self::extension(file).as_deref() == Some("obj") {
            let text = String::from_utf8(bytes).map_err(|_| BinderyError::ImportFailed {
                file: file.to_string(),
                reason: "not valid UTF-8".to_string(),
            })?;
            return parse_obj(file, &text);
        }

        let cube = ProxyMesh::cube();
        Ok(ProxyMesh {
            source: ProxySource::Imported {
                files: vec![file.to_string()],
            },
            vertex_count: 0,
            ..cube
        })
    }
}

fn parse_obj(file: &str, text: &str) -> Result<ProxyMesh, BinderyError> {
    let malformed = |line: usize, reason: &str| BinderyError::ImportFailed {
        file: file.to_string(),
        reason: format!("line {line}: {reason}"),
    };

    let mut points = Vec::new();
    for (index, line) in text.lines().enumerate() {
        let mut fields = line.split_whitespace();
        if fields.next() != Some("v") {
            continue;
        }
        let coords: Vec<f64> = fields
            .take(3)
            .map(str::parse)
            .collect::<Result<_, _>>()
            .map_err(|_| malformed(index + 1, "invalid vertex coordinate"))?;
        let [x, y, z] = coords[..] else {
            return Err(malformed(index + 1, "vertex needs three coordinates"));
        };
        points.push(Vec3::new(x, y, z));
    }

    let Some(first) = points.first().copied() else {
        return Err(BinderyError::ImportFailed {
            file: file.to_string(),
            reason: "no vertices".to_string(),
        });
    };
    let (min, max) = points.iter().fold((first, first), |(lo, hi), p| {
        (
            Vec3::new(lo.x.min(p.x), lo.y.min(p.y), lo.z.min(p.z)),
            Vec3::new(hi.x.max(p.x), hi.y.max(p.y), hi.z.max(p.z)),
        )
    });
    Ok(ProxyMesh {
        source: ProxySource::Imported {
            files: vec![file.to_string()],
        },
        bounds_min: min,
        bounds_max: max,
        vertex_count: points.len(),
    })
}

// =============================================================================
// MODEL HELPERS
// =============================================================================

/// Attach a freshly generated cube proxy to `vertex`.
pub fn generate_cube(
    model: &mut GeometryModel,
    importer: &dyn AssetImporter,
    vertex: GeometryId,
    name: &str,
    size: Vec3,
) -> Result<GeometryId, BinderyError> {
    model.add_proxy(name, vertex, size, Vec3::ZERO, importer.generate_cube())
}

/// Turn an existing proxy back into a cube of the given size.
pub fn update_cube(
    model: &mut GeometryModel,
    importer: &dyn AssetImporter,
    proxy: GeometryId,
    size: Vec3,
    rotation: Vec3,
) -> Result<(), BinderyError> {
    model.set_proxy_mesh(proxy, importer.generate_cube())?;
    model.set_proxy_transform(proxy, size, rotation, None)
}

/// Re-import `files` into an existing proxy.
///
/// Returns the import failures as warning messages. When nothing could be
/// imported the proxy falls back to a cube.
pub fn update_proxy_combined(
    model: &mut GeometryModel,
    importer: &dyn AssetImporter,
    proxy: GeometryId,
    files: &[String],
) -> Result<Vec<String>, BinderyError> {
    let outcome = importer.load_models_combined(files);
    let warnings = outcome.failures.iter().map(ToString::to_string).collect();
    let mesh = outcome.mesh.unwrap_or_else(|| importer.generate_cube());
    model.set_proxy_mesh(proxy, mesh)?;
    Ok(warnings)
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ModelId;
    use std::io::Write;

    fn importer(root: &Path) -> FsAssetImporter {
        FsAssetImporter::new(
            Some(root.to_path_buf()),
            &["obj".to_string(), "stl".to_string()],
        )
    }

    #[test]
    fn recognises_configured_extensions_only() {
        let importer = FsAssetImporter::new(None, &["OBJ".to_string()]);
        assert!(importer.is_recognized("pump.obj"));
        assert!(importer.is_recognized("PUMP.OBJ"));
        assert!(!importer.is_recognized("notes.txt"));
        assert!(!importer.is_recognized("no_extension"));
    }

    #[test]
    fn obj_bounds_are_read_from_vertices() {
        let dir = tempfile::tempdir().expect("tempdir");
        let mut file = std::fs::File::create(dir.path().join("valve.obj")).expect("create");
        writeln!(file, "# valve\nv 0 0 0\nv 2 1 0\nv 1 3 -1\nf 1 2 3").expect("write");

        let mesh = importer(dir.path()).load_model("valve.obj").expect("import");

        assert_eq!(mesh.vertex_count, 3);
        assert_eq!(mesh.bounds_min, Vec3::new(0.0, 0.0, -1.0));
        assert_eq!(mesh.bounds_max, Vec3::new(2.0, 3.0, 0.0));
    }

    #[test]
    fn failures_are_collected_next_to_successes() {
        let dir = tempfile::tempdir().expect("tempdir");
        std::fs::write(dir.path().join("good.obj"), "v 0 0 0\nv 1 1 1\n").expect("write");
        std::fs::write(dir.path().join("empty.stl"), "").expect("write");
        std::fs::write(dir.path().join("broken.obj"), "v 0 x 0\n").expect("write");

        let files = ["good.obj", "missing.obj", "empty.stl", "broken.obj"].map(String::from);
        let outcome = importer(dir.path()).load_models_combined(&files);

        assert!(outcome.mesh.is_some());
        assert_eq!(outcome.failures.len(), 3);
        assert!(matches!(outcome.failures[0], BinderyError::FileNotFound(_)));
        assert!(matches!(outcome.failures[1], BinderyError::ImportFailed { .. }));
    }

    #[test]
    fn combined_import_falls_back_to_cube() {
        let dir = tempfile::tempdir().expect("tempdir");
        let importer = importer(dir.path());
        let mut model = GeometryModel::new(ModelId(1), "m");
        let vertex = model.add_vertex("v", Vec3::ZERO);
        let proxy = generate_cube(&mut model, &importer, vertex, "proxy", Vec3::ONE).expect("cube");

        let warnings =
            update_proxy_combined(&mut model, &importer, proxy, &["gone.obj".to_string()])
                .expect("update");

        assert_eq!(warnings.len(), 1);
        assert!(warnings[0].contains("gone.obj"));
        let crate::geometry::Shape::ProxyShape { mesh, .. } = &model.get(proxy).expect("proxy").shape
        else {
            unreachable!("proxy shape expected");
        };
        assert!(mesh.is_cube());
    }
}
