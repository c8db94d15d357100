//! 绘图端（源系统）数据模型：实体、文档以及文档锁/事务作用域。

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::geometry::{Interval, Plane, Point2, Point3, Vector3};
use crate::units::LengthUnit;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EntityId(u64);

impl EntityId {
    #[inline]
    pub fn new(raw: u64) -> Self {
        Self(raw)
    }

    #[inline]
    pub fn get(self) -> u64 {
        self.0
    }
}

#[derive(Debug, Error)]
pub enum DocumentError {
    #[error("entity with id {0} not found")]
    EntityNotFound(u64),
    #[error("entity {id} is a {actual}, expected {expected}")]
    UnexpectedEntity {
        id: u64,
        expected: &'static str,
        actual: &'static str,
    },
}

/// 绘图端实体。`Unsupported` 表示宿主能识别但本引擎未映射的类型。
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Entity {
    Point(PointEntity),
    Line(Line),
    Circle(Circle),
    Arc(Arc),
    Ellipse(Ellipse),
    Spline(Spline),
    Polyline(Polyline),
    Polyline3d(Polyline3d),
    CompositeCurve(CompositeCurve),
    NurbSurface(NurbSurface),
    PolyFaceMesh(PolyFaceMesh),
    SubDMesh(SubDMesh),
    Solid3d(Solid3d),
    Text(Text),
    MText(MText),
    Hatch(Hatch),
    Dimension(Dimension),
    Leader(Leader),
    MLeader(MLeader),
    Unsupported { type_name: String },
}

impl Entity {
    /// 注册表使用的静态类型标签。
    pub fn type_tag(&self) -> &'static str {
        match self {
            Entity::Point(_) => "point",
            Entity::Line(_) => "line",
            Entity::Circle(_) => "circle",
            Entity::Arc(_) => "arc",
            Entity::Ellipse(_) => "ellipse",
            Entity::Spline(_) => "spline",
            Entity::Polyline(_) => "polyline",
            Entity::Polyline3d(_) => "polyline3d",
            Entity::CompositeCurve(_) => "composite_curve",
            Entity::NurbSurface(_) => "nurb_surface",
            Entity::PolyFaceMesh(_) => "polyface_mesh",
            Entity::SubDMesh(_) => "subd_mesh",
            Entity::Solid3d(_) => "solid3d",
            Entity::Text(_) => "text",
            Entity::MText(_) => "mtext",
            Entity::Hatch(_) => "hatch",
            Entity::Dimension(_) => "dimension",
            Entity::Leader(_) => "leader",
            Entity::MLeader(_) => "mleader",
            Entity::Unsupported { .. } => "unsupported",
        }
    }

    /// 宿主侧的类型名称，未支持类型返回其原始名称。
    pub fn type_name(&self) -> &str {
        match self {
            Entity::Unsupported { type_name } => type_name,
            other => other.type_tag(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PointEntity {
    pub position: Point3,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Line {
    pub start: Point3,
    pub end: Point3,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Circle {
    pub center: Point3,
    pub normal: Vector3,
    pub radius: f64,
}

/// 圆弧实体，角度以弧度形式储存，相对 OCS X 轴按逆时针计。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Arc {
    pub center: Point3,
    pub normal: Vector3,
    pub radius: f64,
    pub start_angle: f64,
    pub end_angle: f64,
}

/// 椭圆实体，记录主轴向量、短长轴比与参数范围（单位为弧度）。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Ellipse {
    pub center: Point3,
    pub normal: Vector3,
    pub major_axis: Vector3,
    pub radius_ratio: f64,
    pub start_param: f64,
    pub end_param: f64,
}

impl Ellipse {
    pub fn minor_axis(&self) -> Option<Vector3> {
        let normal = self.normal.normalize()?;
        Some(Vector3(
            normal.cross(self.major_axis).as_vec3() * self.radius_ratio,
        ))
    }

    /// 参数 `t` 处的点：`center + cos(t)·major + sin(t)·minor`。
    pub fn point_at(&self, t: f64) -> Option<Point3> {
        let minor = self.minor_axis()?;
        Some(Point3(
            self.center.0 + self.major_axis.0 * t.cos() + minor.0 * t.sin(),
        ))
    }
}

/// 样条实体。节点向量采用完整约定（`degree + N + 1`）。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Spline {
    pub degree: usize,
    pub control_points: Vec<Point3>,
    #[serde(default)]
    pub weights: Vec<f64>,
    pub knots: Vec<f64>,
    #[serde(default)]
    pub is_periodic: bool,
    #[serde(default)]
    pub is_closed: bool,
    /// 裁剪后的参数子区间。
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub domain: Option<Interval>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PolylineVertex {
    pub position: Point2,
    pub bulge: f64,
}

impl PolylineVertex {
    #[inline]
    pub fn new(position: Point2) -> Self {
        Self {
            position,
            bulge: 0.0,
        }
    }

    #[inline]
    pub fn with_bulge(position: Point2, bulge: f64) -> Self {
        Self { position, bulge }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SegmentType {
    Line,
    Arc,
    Coincident,
    Point,
    Empty,
}

/// 轻量多段线：顶点位于 OCS 平面（由法向量与标高确定）。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Polyline {
    pub vertices: Vec<PolylineVertex>,
    pub is_closed: bool,
    #[serde(default)]
    pub elevation: f64,
    pub normal: Vector3,
}

impl Polyline {
    /// OCS 平面：原点沿法向偏移标高。
    pub fn ocs_plane(&self) -> Option<Plane> {
        let plane = Plane::from_normal(Point3::ORIGIN, self.normal)?;
        Some(plane.with_origin(Point3(plane.z_axis.0 * self.elevation)))
    }

    pub fn segment_count(&self) -> usize {
        match self.vertices.len() {
            0 | 1 => self.vertices.len(),
            n if self.is_closed => n,
            n => n - 1,
        }
    }

    pub fn segment_type(&self, index: usize) -> SegmentType {
        match self.vertices.len() {
            0 => return SegmentType::Empty,
            1 => return SegmentType::Point,
            _ => {}
        }
        if index >= self.segment_count() {
            return SegmentType::Empty;
        }
        let start = self.vertices[index];
        let end = self.vertices[(index + 1) % self.vertices.len()];
        if start.position.vector_to(end.position).length() <= 1e-12 {
            SegmentType::Coincident
        } else if start.bulge.abs() > 1e-12 {
            SegmentType::Arc
        } else {
            SegmentType::Line
        }
    }

    /// 第 `index` 段的 OCS 起止点与凸度。
    pub fn segment(&self, index: usize) -> Option<(Point2, Point2, f64)> {
        if index >= self.segment_count() || self.vertices.len() < 2 {
            return None;
        }
        let start = self.vertices[index];
        let end = self.vertices[(index + 1) % self.vertices.len()];
        Some((start.position, end.position, start.bulge))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Polyline3d {
    pub vertices: Vec<Point3>,
    pub is_closed: bool,
}

/// 复合曲线：按顺序首尾相接的曲线实体。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompositeCurve {
    pub segments: Vec<Entity>,
}

/// NURBS 曲面；控制点按 u 主序排列（索引 `u * count_v + v`），节点为完整约定。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NurbSurface {
    pub degree_u: usize,
    pub degree_v: usize,
    pub count_u: usize,
    pub count_v: usize,
    pub control_points: Vec<Point3>,
    #[serde(default)]
    pub weights: Vec<f64>,
    pub knots_u: Vec<f64>,
    pub knots_v: Vec<f64>,
}

/// 多面网格。面索引从 1 开始，负值表示该边不可见，第四个索引为 0 表示三角形。
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PolyFaceMesh {
    pub vertices: Vec<Point3>,
    pub faces: Vec<[i32; 4]>,
}

/// 细分网格。`face_array` 为 `[n, i0, .., i(n-1), n, ..]` 形式，索引从 0 开始。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubDMesh {
    pub vertices: Vec<Point3>,
    pub face_array: Vec<i32>,
    #[serde(default)]
    pub smooth_level: u32,
}

/// 平面面片：`origin`、`origin + u_edge`、`origin + v_edge` 张成的平行四边形。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlanarPatch {
    pub origin: Point3,
    pub u_edge: Vector3,
    pub v_edge: Vector3,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FaceSurface {
    Planar(PlanarPatch),
    Nurbs(NurbSurface),
}

/// 实体中的一个连通块；`shared_edges` 记录相邻面的索引对。
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SolidLump {
    pub faces: Vec<FaceSurface>,
    #[serde(default)]
    pub shared_edges: Vec<[usize; 2]>,
}

/// 三维实体。宿主不开放任意实体的 NURBS 分解，只能炸开为独立面。
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Solid3d {
    pub lumps: Vec<SolidLump>,
}

impl Solid3d {
    /// 炸开为各个面，丢失面之间的拓扑关系。
    pub fn explode(&self) -> impl Iterator<Item = &FaceSurface> {
        self.lumps.iter().flat_map(|lump| lump.faces.iter())
    }

    pub fn face_count(&self) -> usize {
        self.lumps.iter().map(|lump| lump.faces.len()).sum()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Text {
    pub position: Point3,
    pub normal: Vector3,
    pub height: f64,
    pub rotation: f64,
    pub content: String,
}

/// 多行文字，`contents` 含内联格式代码。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MText {
    pub location: Point3,
    pub normal: Vector3,
    pub direction: Vector3,
    pub height: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub width: Option<f64>,
    pub contents: String,
    #[serde(default)]
    pub attachment: i16,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub style_name: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HatchPattern {
    pub name: String,
    pub scale: f64,
    pub angle: f64,
    pub is_solid: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HatchLoop {
    pub is_outer: bool,
    pub is_polyline: bool,
    pub edges: Vec<HatchEdge>,
}

/// 填充边界边，坐标位于填充 OCS 平面内。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum HatchEdge {
    Line {
        start: Point2,
        end: Point2,
    },
    Arc {
        center: Point2,
        radius: f64,
        start_angle: f64,
        end_angle: f64,
        is_counter_clockwise: bool,
    },
    PolylineSegment {
        start: Point2,
        end: Point2,
        bulge: f64,
    },
    Ellipse {
        center: Point2,
        major_axis: Point2,
        minor_ratio: f64,
        start_angle: f64,
        end_angle: f64,
        is_counter_clockwise: bool,
    },
    Spline {
        control_points: Vec<Point2>,
        #[serde(default)]
        weights: Vec<f64>,
        knot_values: Vec<f64>,
        degree: usize,
    },
    BoundaryReference {
        handle: String,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Hatch {
    pub pattern: HatchPattern,
    pub normal: Vector3,
    #[serde(default)]
    pub elevation: f64,
    pub loops: Vec<HatchLoop>,
}

impl Hatch {
    pub fn ocs_plane(&self) -> Option<Plane> {
        let plane = Plane::from_normal(Point3::ORIGIN, self.normal)?;
        Some(plane.with_origin(Point3(plane.z_axis.0 * self.elevation)))
    }
}

/// 各标注类型的定义点。
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DimensionKind {
    Rotated {
        xline1: Point3,
        xline2: Point3,
        dim_line_point: Point3,
        rotation: f64,
    },
    Aligned {
        xline1: Point3,
        xline2: Point3,
        dim_line_point: Point3,
    },
    LineAngular {
        xline1_start: Point3,
        xline1_end: Point3,
        xline2_start: Point3,
        xline2_end: Point3,
        arc_point: Point3,
    },
    Point3Angular {
        center: Point3,
        xline1: Point3,
        xline2: Point3,
        arc_point: Point3,
    },
    ArcLength {
        center: Point3,
        xline1: Point3,
        xline2: Point3,
        arc_point: Point3,
    },
    Radial {
        center: Point3,
        chord_point: Point3,
        leader_length: f64,
    },
    Diametric {
        chord_point: Point3,
        far_chord_point: Point3,
        leader_length: f64,
    },
    Ordinate {
        origin: Point3,
        defining_point: Point3,
        leader_end_point: Point3,
        uses_x_axis: bool,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Dimension {
    pub kind: DimensionKind,
    pub normal: Vector3,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text_override: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text_position: Option<Point3>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub measurement: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub style_name: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Leader {
    pub vertices: Vec<Point3>,
    pub normal: Vector3,
    pub has_arrowhead: bool,
    /// 关联注释（多行文字内容）。
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub annotation: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LeaderLine {
    pub vertices: Vec<Point3>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum MLeaderContent {
    MText { text: String, location: Point3 },
    Block { block_name: String, location: Point3 },
    None,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MLeader {
    pub leader_lines: Vec<LeaderLine>,
    pub content: MLeaderContent,
    pub normal: Vector3,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text_height: Option<f64>,
    #[serde(default)]
    pub has_dogleg: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dogleg_length: Option<f64>,
}

/// 绘图文档。转换引擎只借用文档，不持有其生命周期。
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct Document {
    #[serde(default)]
    units: LengthUnit,
    entities: Vec<(EntityId, Entity)>,
    next_entity_id: u64,
    #[serde(skip)]
    locked: bool,
}

impl Document {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_units(units: LengthUnit) -> Self {
        Self {
            units,
            ..Self::default()
        }
    }

    #[inline]
    pub fn units(&self) -> LengthUnit {
        self.units
    }

    pub fn add_entity(&mut self, entity: Entity) -> EntityId {
        let id = self.next_id();
        self.entities.push((id, entity));
        id
    }

    #[inline]
    pub fn entities(&self) -> impl Iterator<Item = &(EntityId, Entity)> {
        self.entities.iter()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.entities.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    pub fn entity(&self, id: EntityId) -> Option<&Entity> {
        self.entities
            .iter()
            .find_map(|(entity_id, entity)| (*entity_id == id).then_some(entity))
    }

    pub fn entity_mut(&mut self, id: EntityId) -> Option<&mut Entity> {
        self.entities
            .iter_mut()
            .find_map(|(entity_id, entity)| (*entity_id == id).then_some(entity))
    }

    pub fn erase(&mut self, id: EntityId) -> Option<Entity> {
        let index = self.entities.iter().position(|(entity_id, _)| *entity_id == id)?;
        Some(self.entities.remove(index).1)
    }

    #[inline]
    pub fn is_locked(&self) -> bool {
        self.locked
    }

    /// 获取文档独占锁，锁在返回值析构时释放。
    pub fn lock(&mut self) -> DocumentLock<'_> {
        self.locked = true;
        DocumentLock { document: self }
    }

    #[inline]
    fn next_id(&mut self) -> EntityId {
        let id = self.next_entity_id;
        self.next_entity_id += 1;
        EntityId(id)
    }
}

pub struct DocumentLock<'a> {
    document: &'a mut Document,
}

impl DocumentLock<'_> {
    #[inline]
    pub fn document(&self) -> &Document {
        self.document
    }

    /// 开启事务。未提交即析构的事务会擦除期间追加的全部实体。
    pub fn start_transaction(&mut self) -> Transaction<'_> {
        Transaction {
            document: self.document,
            appended: Vec::new(),
            committed: false,
        }
    }
}

impl Drop for DocumentLock<'_> {
    fn drop(&mut self) {
        self.document.locked = false;
    }
}

pub struct Transaction<'a> {
    document: &'a mut Document,
    appended: Vec<EntityId>,
    committed: bool,
}

impl Transaction<'_> {
    pub fn append(&mut self, entity: Entity) -> EntityId {
        let id = self.document.add_entity(entity);
        self.appended.push(id);
        id
    }

    pub fn entity_mut(&mut self, id: EntityId) -> Result<&mut Entity, DocumentError> {
        self.document
            .entity_mut(id)
            .ok_or(DocumentError::EntityNotFound(id.get()))
    }

    #[inline]
    pub fn document(&self) -> &Document {
        self.document
    }

    /// 提交事务，返回期间追加的实体。
    pub fn commit(mut self) -> Vec<EntityId> {
        self.committed = true;
        std::mem::take(&mut self.appended)
    }
}

impl Drop for Transaction<'_> {
    fn drop(&mut self) {
        if self.committed {
            return;
        }
        for id in self.appended.drain(..) {
            self.document.erase(id);
        }
    }
}
