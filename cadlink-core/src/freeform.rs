//! 自由曲面端（目标系统）数据模型。NURBS 节点采用紧凑约定（`degree + N - 1`）。

use std::f64::consts::TAU;

use serde::{Deserialize, Serialize};

use crate::geometry::{Interval, Plane, Point2, Point3};
use crate::nurbs::{self, BSplineCurve, KnotError};
use crate::units::LengthUnit;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LineCurve {
    pub start: Point3,
    pub end: Point3,
}

/// 平面圆弧：圆心为平面原点，角度区间相对平面 X 轴。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArcCurve {
    pub plane: Plane,
    pub radius: f64,
    pub angle: Interval,
}

impl ArcCurve {
    pub fn circle(plane: Plane, radius: f64) -> Self {
        Self {
            plane,
            radius,
            angle: Interval::new(0.0, TAU),
        }
    }

    #[inline]
    pub fn is_circle(&self) -> bool {
        self.angle.length() >= TAU - 1e-12
    }

    pub fn point_at_angle(&self, angle: f64) -> Point3 {
        self.plane
            .point_at(self.radius * angle.cos(), self.radius * angle.sin())
    }

    #[inline]
    pub fn start_point(&self) -> Point3 {
        self.point_at_angle(self.angle.start)
    }

    #[inline]
    pub fn end_point(&self) -> Point3 {
        self.point_at_angle(self.angle.end)
    }

    pub fn to_bspline(&self) -> BSplineCurve {
        BSplineCurve::elliptical_arc(
            self.plane.origin.0,
            self.plane.x_axis.0 * self.radius,
            self.plane.y_axis.0 * self.radius,
            self.angle.start,
            self.angle.end,
        )
    }
}

/// NURBS 曲线，控制点为笛卡尔坐标，权重单独存放。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NurbsCurve {
    pub degree: usize,
    pub points: Vec<Point3>,
    pub weights: Vec<f64>,
    pub knots: Vec<f64>,
}

impl NurbsCurve {
    pub fn from_bspline(curve: &BSplineCurve) -> Result<Self, KnotError> {
        let knots = nurbs::full_to_compact(&curve.knots, curve.degree, curve.points.len())?;
        Ok(Self {
            degree: curve.degree,
            points: curve.locations().into_iter().map(Point3).collect(),
            weights: curve.weights(),
            knots,
        })
    }

    pub fn to_bspline(&self) -> Result<BSplineCurve, KnotError> {
        let full = nurbs::compact_to_full(&self.knots, self.degree, self.points.len())?;
        let locations: Vec<_> = self.points.iter().map(|p| p.0).collect();
        BSplineCurve::from_weighted(self.degree, &locations, &self.weights, full)
    }

    #[inline]
    pub fn is_rational(&self) -> bool {
        self.weights.iter().any(|w| (w - 1.0).abs() > 1e-12)
    }

    /// 紧凑约定下的参数域：`knots[degree - 1] .. knots[N - 1]`。
    pub fn domain(&self) -> Option<Interval> {
        let start = *self.knots.get(self.degree.checked_sub(1)?)?;
        let end = *self.knots.get(self.points.len().checked_sub(1)?)?;
        Some(Interval::new(start, end))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PolyCurve {
    pub segments: Vec<Curve>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PolylineCurve {
    pub points: Vec<Point3>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Curve {
    Line(LineCurve),
    Arc(ArcCurve),
    Nurbs(NurbsCurve),
    PolyCurve(PolyCurve),
    Polyline(PolylineCurve),
    Unsupported { type_name: String },
}

impl Curve {
    pub fn type_tag(&self) -> &'static str {
        match self {
            Curve::Line(_) => "line_curve",
            Curve::Arc(_) => "arc_curve",
            Curve::Nurbs(_) => "nurbs_curve",
            Curve::PolyCurve(_) => "poly_curve",
            Curve::Polyline(_) => "polyline_curve",
            Curve::Unsupported { .. } => "unsupported",
        }
    }

    pub fn start_point(&self) -> Option<Point3> {
        match self {
            Curve::Line(line) => Some(line.start),
            Curve::Arc(arc) => Some(arc.start_point()),
            Curve::Nurbs(curve) => curve.points.first().copied(),
            Curve::PolyCurve(poly) => poly.segments.first()?.start_point(),
            Curve::Polyline(polyline) => polyline.points.first().copied(),
            Curve::Unsupported { .. } => None,
        }
    }

    pub fn end_point(&self) -> Option<Point3> {
        match self {
            Curve::Line(line) => Some(line.end),
            Curve::Arc(arc) => Some(arc.end_point()),
            Curve::Nurbs(curve) => curve.points.last().copied(),
            Curve::PolyCurve(poly) => poly.segments.last()?.end_point(),
            Curve::Polyline(polyline) => polyline.points.last().copied(),
            Curve::Unsupported { .. } => None,
        }
    }

    /// 转为单条 B 样条。多段曲线按 `tolerance` 检查首尾连续后合并；
    /// 未支持或退化的曲线返回 `Ok(None)`。
    pub fn to_bspline(&self, tolerance: f64) -> Result<Option<BSplineCurve>, KnotError> {
        let curve = match self {
            Curve::Line(line) => BSplineCurve::line(line.start.0, line.end.0),
            Curve::Arc(arc) => arc.to_bspline(),
            Curve::Nurbs(curve) => curve.to_bspline()?,
            Curve::PolyCurve(poly) => {
                let mut parts = Vec::with_capacity(poly.segments.len());
                for segment in &poly.segments {
                    if let Some(part) = segment.to_bspline(tolerance)? {
                        parts.push(part.clamped()?);
                    }
                }
                if parts.is_empty() {
                    return Ok(None);
                }
                BSplineCurve::join(&parts, tolerance)?
            }
            Curve::Polyline(polyline) => match polyline_bspline(&polyline.points)? {
                Some(curve) => curve,
                None => return Ok(None),
            },
            Curve::Unsupported { .. } => return Ok(None),
        };
        Ok(Some(curve))
    }
}

/// 一次 B 样条，节点为累计弦长；重合的相邻点只保留一个。
fn polyline_bspline(points: &[Point3]) -> Result<Option<BSplineCurve>, KnotError> {
    let mut kept: Vec<Point3> = Vec::with_capacity(points.len());
    for point in points {
        if kept
            .last()
            .is_none_or(|last| last.distance_to(*point) > nurbs::KNOT_TOLERANCE)
        {
            kept.push(*point);
        }
    }
    if kept.len() < 2 {
        return Ok(None);
    }
    let mut knots = vec![0.0, 0.0];
    let mut length = 0.0;
    for pair in kept.windows(2) {
        length += pair[0].distance_to(pair[1]);
        knots.push(length);
    }
    knots.push(length);
    let locations: Vec<_> = kept.iter().map(|p| p.0).collect();
    BSplineCurve::from_weighted(1, &locations, &[], knots).map(Some)
}

/// NURBS 曲面，控制点 u 主序（索引 `u * count_v + v`）。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NurbsSurface {
    pub degree_u: usize,
    pub degree_v: usize,
    pub count_u: usize,
    pub count_v: usize,
    pub points: Vec<Point3>,
    pub weights: Vec<f64>,
    pub knots_u: Vec<f64>,
    pub knots_v: Vec<f64>,
}

impl NurbsSurface {
    #[inline]
    pub fn point(&self, u: usize, v: usize) -> Option<Point3> {
        self.points.get(u * self.count_v + v).copied()
    }

    #[inline]
    pub fn is_rational(&self) -> bool {
        self.weights.iter().any(|w| (w - 1.0).abs() > 1e-12)
    }
}

/// 网格面，索引从 0 开始；`c == d` 表示三角形。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MeshFace {
    pub a: usize,
    pub b: usize,
    pub c: usize,
    pub d: usize,
}

impl MeshFace {
    #[inline]
    pub fn triangle(a: usize, b: usize, c: usize) -> Self {
        Self { a, b, c, d: c }
    }

    #[inline]
    pub fn quad(a: usize, b: usize, c: usize, d: usize) -> Self {
        Self { a, b, c, d }
    }

    #[inline]
    pub fn is_triangle(&self) -> bool {
        self.c == self.d
    }

    pub fn indices(&self) -> Vec<usize> {
        if self.is_triangle() {
            vec![self.a, self.b, self.c]
        } else {
            vec![self.a, self.b, self.c, self.d]
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Mesh {
    pub vertices: Vec<Point3>,
    pub faces: Vec<MeshFace>,
}

/// 真实边界表示：面之间由共享边缝合。
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Brep {
    pub faces: Vec<NurbsSurface>,
    pub edges: Vec<[usize; 2]>,
    pub is_solid: bool,
}

/// 由独立 NURBS 面组成的 Brep 替身，不含拓扑，永远不是实体。
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BrepProxy {
    pub faces: Vec<NurbsSurface>,
}

impl BrepProxy {
    #[inline]
    pub fn face_count(&self) -> usize {
        self.faces.len()
    }
}

/// 标注文字信息；`text_point` 位于标注平面内。
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DimensionText {
    pub user_text: Option<String>,
    pub text_point: Option<Point2>,
    pub measurement: Option<f64>,
    pub style: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinearDimension {
    pub plane: Plane,
    pub ext1: Point2,
    pub ext2: Point2,
    pub dim_line: Point2,
    pub aligned: bool,
    pub text: DimensionText,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AngularMeasure {
    Angle,
    ArcLength,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AngularDimension {
    pub plane: Plane,
    pub center: Point2,
    pub def1: Point2,
    pub def2: Point2,
    pub arc_point: Point2,
    pub measure: AngularMeasure,
    pub text: DimensionText,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RadialDimension {
    pub plane: Plane,
    pub center: Point2,
    pub radius_point: Point2,
    pub dim_line: Point2,
    pub is_diameter: bool,
    pub text: DimensionText,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrdinateAxis {
    X,
    Y,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrdinateDimension {
    pub plane: Plane,
    pub base: Point2,
    pub defining: Point2,
    pub leader: Point2,
    pub axis: OrdinateAxis,
    pub text: DimensionText,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Dimension {
    Linear(LinearDimension),
    Angular(AngularDimension),
    Radial(RadialDimension),
    Ordinate(OrdinateDimension),
}

impl Dimension {
    pub fn plane(&self) -> &Plane {
        match self {
            Dimension::Linear(dim) => &dim.plane,
            Dimension::Angular(dim) => &dim.plane,
            Dimension::Radial(dim) => &dim.plane,
            Dimension::Ordinate(dim) => &dim.plane,
        }
    }

    pub fn text(&self) -> &DimensionText {
        match self {
            Dimension::Linear(dim) => &dim.text,
            Dimension::Angular(dim) => &dim.text,
            Dimension::Radial(dim) => &dim.text,
            Dimension::Ordinate(dim) => &dim.text,
        }
    }
}

/// 引线；文字只保留纯文本。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Leader {
    pub plane: Plane,
    pub points: Vec<Point2>,
    pub text: Option<String>,
    pub has_arrowhead: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextEntity {
    pub plane: Plane,
    pub height: f64,
    pub plain_text: String,
    /// RTF 封装的富文本；无格式时为 `None`。
    pub rich_text: Option<String>,
    pub wrap_width: Option<f64>,
    pub font: Option<String>,
    pub justification: i16,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HatchLoop {
    pub curve: Curve,
    pub is_outer: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Hatch {
    pub plane: Plane,
    pub loops: Vec<HatchLoop>,
    pub pattern: String,
    pub rotation: f64,
    pub scale: f64,
    pub is_solid: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Geometry {
    Point { location: Point3 },
    Curve(Curve),
    Surface(NurbsSurface),
    Mesh(Mesh),
    Brep(Brep),
    BrepProxy(BrepProxy),
    Text(TextEntity),
    Leader(Leader),
    Dimension(Dimension),
    Hatch(Hatch),
    Unsupported { type_name: String },
}

impl Geometry {
    pub fn type_tag(&self) -> &'static str {
        match self {
            Geometry::Point { .. } => "point",
            Geometry::Curve(curve) => curve.type_tag(),
            Geometry::Surface(_) => "nurbs_surface",
            Geometry::Mesh(_) => "mesh",
            Geometry::Brep(_) => "brep",
            Geometry::BrepProxy(_) => "brep_proxy",
            Geometry::Text(_) => "text",
            Geometry::Leader(_) => "leader",
            Geometry::Dimension(_) => "dimension",
            Geometry::Hatch(_) => "hatch",
            Geometry::Unsupported { .. } => "unsupported",
        }
    }
}

/// 无界面的模型实例，作为文件往返导入的目标。
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Model {
    #[serde(default)]
    units: LengthUnit,
    objects: Vec<Geometry>,
}

impl Model {
    pub fn new(units: LengthUnit) -> Self {
        Self {
            units,
            objects: Vec::new(),
        }
    }

    #[inline]
    pub fn units(&self) -> LengthUnit {
        self.units
    }

    pub fn add(&mut self, geometry: Geometry) -> usize {
        self.objects.push(geometry);
        self.objects.len() - 1
    }

    #[inline]
    pub fn objects(&self) -> &[Geometry] {
        &self.objects
    }

    pub fn into_objects(self) -> Vec<Geometry> {
        self.objects
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.objects.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::Vector3;

    #[test]
    fn nurbs_curve_keeps_compact_knots() {
        let arc = BSplineCurve::elliptical_arc(
            glam::DVec3::ZERO,
            glam::DVec3::X,
            glam::DVec3::Y,
            0.0,
            std::f64::consts::PI,
        );
        let curve = NurbsCurve::from_bspline(&arc).unwrap();
        assert_eq!(curve.knots.len(), curve.degree + curve.points.len() - 1);
        assert!(curve.is_rational());
        let back = curve.to_bspline().unwrap();
        assert_eq!(back.knots, arc.knots);
        let domain = curve.domain().unwrap();
        assert_eq!((domain.start, domain.end), arc.domain());
    }

    #[test]
    fn polyline_curve_skips_repeated_points() {
        let curve = Curve::Polyline(PolylineCurve {
            points: vec![
                Point3::new(0.0, 0.0, 0.0),
                Point3::new(3.0, 0.0, 0.0),
                Point3::new(3.0, 0.0, 0.0),
                Point3::new(3.0, 4.0, 0.0),
            ],
        });
        let spline = curve.to_bspline(1e-9).unwrap().unwrap();
        assert_eq!(spline.points.len(), 3);
        assert_eq!(spline.domain(), (0.0, 7.0));
    }

    #[test]
    fn poly_curve_joins_segments() {
        let plane = Plane::from_normal(Point3::new(1.0, 0.0, 0.0), Vector3::Z).unwrap();
        let poly = Curve::PolyCurve(PolyCurve {
            segments: vec![
                Curve::Line(LineCurve {
                    start: Point3::new(0.0, 0.0, 0.0),
                    end: Point3::new(2.0, 0.0, 0.0),
                }),
                Curve::Arc(ArcCurve {
                    plane: plane.rotated(std::f64::consts::PI),
                    radius: 1.0,
                    angle: Interval::new(std::f64::consts::PI, std::f64::consts::TAU),
                }),
            ],
        });
        let joined = poly.to_bspline(1e-9).unwrap().unwrap();
        assert_eq!(joined.degree, 2);
        assert!(joined.start_point().distance(glam::DVec3::ZERO) < 1e-9);
        assert!(joined.end_point().distance(glam::DVec3::ZERO) < 1e-9);
        let (_, end) = joined.domain();
        assert!((end - (2.0 + std::f64::consts::PI)).abs() < 1e-12);
        let top = joined.point_at(2.0 + std::f64::consts::FRAC_PI_2);
        assert!(top.distance(glam::DVec3::new(1.0, 1.0, 0.0)) < 1e-9);
    }

    #[test]
    fn mesh_face_triangle_has_three_indices() {
        assert_eq!(MeshFace::triangle(0, 1, 2).indices(), vec![0, 1, 2]);
        assert_eq!(MeshFace::quad(0, 1, 2, 3).indices().len(), 4);
    }
}
