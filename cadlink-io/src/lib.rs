//! 实体 / Brep 文件往返所用的临时交换目录与中性交换格式。

use std::fs;
use std::path::{Path, PathBuf};

use cadlink_core::{
    drafting::{
        Entity, EntityId, FaceSurface, NurbSurface, PlanarPatch, Solid3d, SolidLump,
        Transaction,
    },
    freeform::{Brep, Geometry, Model, NurbsSurface},
    geometry::Point3,
    nurbs::{self, KnotError},
    units::LengthUnit,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const EXCHANGE_FORMAT: &str = "cadlink-exchange";
pub const EXCHANGE_VERSION: u32 = 1;
pub const DEFAULT_SUBDIR: &str = "cadlink/interchange";

#[derive(Debug, Error)]
pub enum IoError {
    #[error("no {0} available")]
    MissingExporter(&'static str),
    #[error("failed to read file {path:?}: {source}")]
    ReadError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to write file {path:?}: {source}")]
    WriteError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse exchange file {path:?}: {source}")]
    ParseError {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("invalid exchange content: {0}")]
    InvalidDocument(String),
    #[error(transparent)]
    Knot(#[from] KnotError),
}

/// 每种转换使用固定文件名，重复使用时直接覆盖。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InterchangeKind {
    SolidExport,
    BrepExport,
}

impl InterchangeKind {
    pub fn file_name(self) -> &'static str {
        match self {
            InterchangeKind::SolidExport => "solid_export.json",
            InterchangeKind::BrepExport => "brep_export.json",
        }
    }
}

/// 进程临时目录下的交换工作区。引擎不会删除其中的文件。
#[derive(Debug, Clone)]
pub struct InterchangeWorkspace {
    root: PathBuf,
}

impl InterchangeWorkspace {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// 位于 `std::env::temp_dir()` 下的固定子目录。
    pub fn in_temp_dir(subdir: &str) -> Self {
        Self::new(std::env::temp_dir().join(subdir))
    }

    #[inline]
    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn path_for(&self, kind: InterchangeKind) -> PathBuf {
        self.root.join(kind.file_name())
    }

    /// 确保目录存在并返回该类转换的文件路径。
    pub fn prepare(&self, kind: InterchangeKind) -> Result<PathBuf, IoError> {
        fs::create_dir_all(&self.root).map_err(|source| IoError::WriteError {
            path: self.root.clone(),
            source,
        })?;
        Ok(self.path_for(kind))
    }
}

impl Default for InterchangeWorkspace {
    fn default() -> Self {
        Self::in_temp_dir(DEFAULT_SUBDIR)
    }
}

/// 交换文件顶层结构。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExchangeFile {
    pub format: String,
    pub version: u32,
    #[serde(default)]
    pub unit: LengthUnit,
    pub bodies: Vec<ExchangeBody>,
}

impl ExchangeFile {
    pub fn new(unit: LengthUnit, bodies: Vec<ExchangeBody>) -> Self {
        Self {
            format: EXCHANGE_FORMAT.to_string(),
            version: EXCHANGE_VERSION,
            unit,
            bodies,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExchangeBody {
    pub faces: Vec<ExchangeFace>,
    #[serde(default)]
    pub edges: Vec<[usize; 2]>,
    #[serde(default)]
    pub closed: bool,
}

/// 单个 NURBS 面。`points` 为 `[x, y, z, w]`（笛卡尔坐标 + 权重），u 主序；节点为完整约定。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExchangeFace {
    pub degree_u: usize,
    pub degree_v: usize,
    pub count_u: usize,
    pub count_v: usize,
    pub points: Vec<[f64; 4]>,
    pub knots_u: Vec<f64>,
    pub knots_v: Vec<f64>,
}

impl ExchangeFace {
    /// 平面面片写作双一次面。
    pub fn from_patch(patch: &PlanarPatch) -> Self {
        let corner = |u: f64, v: f64| {
            let p = patch.origin.0 + patch.u_edge.0 * u + patch.v_edge.0 * v;
            [p.x, p.y, p.z, 1.0]
        };
        Self {
            degree_u: 1,
            degree_v: 1,
            count_u: 2,
            count_v: 2,
            points: vec![
                corner(0.0, 0.0),
                corner(0.0, 1.0),
                corner(1.0, 0.0),
                corner(1.0, 1.0),
            ],
            knots_u: vec![0.0, 0.0, 1.0, 1.0],
            knots_v: vec![0.0, 0.0, 1.0, 1.0],
        }
    }

    pub fn from_drafting(surface: &NurbSurface) -> Self {
        Self {
            degree_u: surface.degree_u,
            degree_v: surface.degree_v,
            count_u: surface.count_u,
            count_v: surface.count_v,
            points: weighted_points(&surface.control_points, &surface.weights),
            knots_u: surface.knots_u.clone(),
            knots_v: surface.knots_v.clone(),
        }
    }

    pub fn from_freeform(surface: &NurbsSurface) -> Result<Self, IoError> {
        Ok(Self {
            degree_u: surface.degree_u,
            degree_v: surface.degree_v,
            count_u: surface.count_u,
            count_v: surface.count_v,
            points: weighted_points(&surface.points, &surface.weights),
            knots_u: nurbs::compact_to_full(&surface.knots_u, surface.degree_u, surface.count_u)?,
            knots_v: nurbs::compact_to_full(&surface.knots_v, surface.degree_v, surface.count_v)?,
        })
    }

    fn validate(&self) -> Result<(), IoError> {
        let expected = self.count_u * self.count_v;
        if self.points.len() != expected {
            return Err(IoError::InvalidDocument(format!(
                "face declares {}x{} control points but carries {}",
                self.count_u,
                self.count_v,
                self.points.len()
            )));
        }
        for (knots, degree, count) in [
            (&self.knots_u, self.degree_u, self.count_u),
            (&self.knots_v, self.degree_v, self.count_v),
        ] {
            if knots.len() != count + degree + 1 {
                return Err(KnotError::Count {
                    expected: count + degree + 1,
                    actual: knots.len(),
                }
                .into());
            }
        }
        Ok(())
    }

    fn split_points(&self, scale: f64) -> (Vec<Point3>, Vec<f64>) {
        self.points
            .iter()
            .map(|[x, y, z, w]| (Point3::new(x * scale, y * scale, z * scale), *w))
            .unzip()
    }

    pub fn to_drafting(&self, scale: f64) -> Result<NurbSurface, IoError> {
        self.validate()?;
        let (control_points, weights) = self.split_points(scale);
        Ok(NurbSurface {
            degree_u: self.degree_u,
            degree_v: self.degree_v,
            count_u: self.count_u,
            count_v: self.count_v,
            control_points,
            weights,
            knots_u: self.knots_u.clone(),
            knots_v: self.knots_v.clone(),
        })
    }

    pub fn to_freeform(&self, scale: f64) -> Result<NurbsSurface, IoError> {
        self.validate()?;
        let (points, weights) = self.split_points(scale);
        Ok(NurbsSurface {
            degree_u: self.degree_u,
            degree_v: self.degree_v,
            count_u: self.count_u,
            count_v: self.count_v,
            points,
            weights,
            knots_u: nurbs::full_to_compact(&self.knots_u, self.degree_u, self.count_u)?,
            knots_v: nurbs::full_to_compact(&self.knots_v, self.degree_v, self.count_v)?,
        })
    }
}

fn weighted_points(points: &[Point3], weights: &[f64]) -> Vec<[f64; 4]> {
    points
        .iter()
        .enumerate()
        .map(|(index, p)| [p.x(), p.y(), p.z(), weights.get(index).copied().unwrap_or(1.0)])
        .collect()
}

/// 文件单位到目标单位的乘数；任一侧未设置时不缩放。
fn import_scale(file_unit: LengthUnit, target: LengthUnit) -> f64 {
    file_unit.ratio_to(target).unwrap_or(1.0)
}

pub trait SolidExporter {
    fn export_solids(
        &self,
        solids: &[&Solid3d],
        units: LengthUnit,
        path: &Path,
    ) -> Result<(), IoError>;
}

pub trait BrepImporter {
    /// 导入到无界面模型，返回新增对象数量。
    fn import_breps(&self, path: &Path, model: &mut Model) -> Result<usize, IoError>;
}

pub trait BrepExporter {
    fn export_breps(&self, breps: &[&Brep], units: LengthUnit, path: &Path) -> Result<(), IoError>;
}

pub trait SolidImporter {
    /// 在调用方提供的事务内追加实体，返回新实体标识。
    fn import_solids(
        &self,
        path: &Path,
        units: LengthUnit,
        transaction: &mut Transaction<'_>,
    ) -> Result<Vec<EntityId>, IoError>;
}

/// 基于 JSON 交换格式的导入导出实现。
#[derive(Debug, Default, Clone, Copy)]
pub struct ExchangeFacade;

impl ExchangeFacade {
    pub fn new() -> Self {
        Self
    }

    pub fn read(&self, path: &Path) -> Result<ExchangeFile, IoError> {
        let data = fs::read_to_string(path).map_err(|source| IoError::ReadError {
            path: path.to_path_buf(),
            source,
        })?;
        let file: ExchangeFile =
            serde_json::from_str(&data).map_err(|source| IoError::ParseError {
                path: path.to_path_buf(),
                source,
            })?;
        if file.format != EXCHANGE_FORMAT {
            return Err(IoError::InvalidDocument(format!(
                "unknown exchange format `{}`",
                file.format
            )));
        }
        if file.version > EXCHANGE_VERSION {
            return Err(IoError::InvalidDocument(format!(
                "exchange version {} is newer than supported {}",
                file.version, EXCHANGE_VERSION
            )));
        }
        tracing::debug!(path = %path.display(), bodies = file.bodies.len(), "读取交换文件");
        Ok(file)
    }

    pub fn write(&self, file: &ExchangeFile, path: &Path) -> Result<(), IoError> {
        let data = serde_json::to_string_pretty(file)
            .map_err(|err| IoError::InvalidDocument(err.to_string()))?;
        fs::write(path, data).map_err(|source| IoError::WriteError {
            path: path.to_path_buf(),
            source,
        })?;
        tracing::debug!(path = %path.display(), bodies = file.bodies.len(), "写入交换文件");
        Ok(())
    }
}

impl SolidExporter for ExchangeFacade {
    fn export_solids(
        &self,
        solids: &[&Solid3d],
        units: LengthUnit,
        path: &Path,
    ) -> Result<(), IoError> {
        let bodies = solids
            .iter()
            .flat_map(|solid| solid.lumps.iter())
            .map(|lump| ExchangeBody {
                faces: lump
                    .faces
                    .iter()
                    .map(|face| match face {
                        FaceSurface::Planar(patch) => ExchangeFace::from_patch(patch),
                        FaceSurface::Nurbs(surface) => ExchangeFace::from_drafting(surface),
                    })
                    .collect(),
                edges: lump.shared_edges.clone(),
                closed: true,
            })
            .collect();
        self.write(&ExchangeFile::new(units, bodies), path)
    }
}

impl BrepImporter for ExchangeFacade {
    fn import_breps(&self, path: &Path, model: &mut Model) -> Result<usize, IoError> {
        let file = self.read(path)?;
        let scale = import_scale(file.unit, model.units());
        let mut breps = Vec::with_capacity(file.bodies.len());
        for body in &file.bodies {
            let faces = body
                .faces
                .iter()
                .map(|face| face.to_freeform(scale))
                .collect::<Result<Vec<_>, _>>()?;
            breps.push(Brep {
                faces,
                edges: body.edges.clone(),
                is_solid: body.closed,
            });
        }
        let count = breps.len();
        for brep in breps {
            model.add(Geometry::Brep(brep));
        }
        Ok(count)
    }
}

impl BrepExporter for ExchangeFacade {
    fn export_breps(&self, breps: &[&Brep], units: LengthUnit, path: &Path) -> Result<(), IoError> {
        let mut bodies = Vec::with_capacity(breps.len());
        for brep in breps {
            bodies.push(ExchangeBody {
                faces: brep
                    .faces
                    .iter()
                    .map(ExchangeFace::from_freeform)
                    .collect::<Result<Vec<_>, _>>()?,
                edges: brep.edges.clone(),
                closed: brep.is_solid,
            });
        }
        self.write(&ExchangeFile::new(units, bodies), path)
    }
}

impl SolidImporter for ExchangeFacade {
    fn import_solids(
        &self,
        path: &Path,
        units: LengthUnit,
        transaction: &mut Transaction<'_>,
    ) -> Result<Vec<EntityId>, IoError> {
        let file = self.read(path)?;
        let scale = import_scale(file.unit, units);
        let mut solids = Vec::with_capacity(file.bodies.len());
        for body in &file.bodies {
            let faces = body
                .faces
                .iter()
                .map(|face| face.to_drafting(scale).map(FaceSurface::Nurbs))
                .collect::<Result<Vec<_>, _>>()?;
            solids.push(Solid3d {
                lumps: vec![SolidLump {
                    faces,
                    shared_edges: body.edges.clone(),
                }],
            });
        }
        Ok(solids
            .into_iter()
            .map(|solid| transaction.append(Entity::Solid3d(solid)))
            .collect())
    }
}
