//! 曲线转换：直线、圆、圆弧、椭圆、样条、多段线与复合曲线。

use std::f64::consts::TAU;

use cadlink_core::{
    drafting::{self, Entity, SegmentType},
    freeform::{ArcCurve, Curve, LineCurve, NurbsCurve, PolyCurve, PolylineCurve},
    geometry::{Interval, Plane, Point2, Point3, Vector3},
    nurbs::{self, BSplineCurve},
};
use glam::DVec2;
use tracing::debug;

use crate::context::ConversionContext;
use crate::errors::ConvertError;
use crate::primitive::{
    ocs_plane, ocs_rotation, plane_to_target, point_to_source, point_to_target, vector_to_target,
};

/// 绘图端曲线实体转为自由曲面端曲线；非曲线实体返回 `Ok(None)`。
pub fn curve_to_target(
    entity: &Entity,
    ctx: &ConversionContext,
) -> Result<Option<Curve>, ConvertError> {
    let curve = match entity {
        Entity::Line(line) => line_to_target(line, ctx),
        Entity::Circle(circle) => circle_to_target(circle, ctx)?,
        Entity::Arc(arc) => arc_to_target(arc, ctx)?,
        Entity::Ellipse(ellipse) => ellipse_to_target(ellipse, ctx)?,
        Entity::Spline(spline) => spline_to_target(spline, ctx)?,
        Entity::Polyline(polyline) => return polyline_to_target(polyline, ctx),
        Entity::Polyline3d(polyline) => return Ok(polyline3d_to_target(polyline, ctx)),
        Entity::CompositeCurve(composite) => return composite_to_target(composite, ctx),
        other => {
            debug!(entity = other.type_name(), "曲线转换器不支持该实体");
            return Ok(None);
        }
    };
    Ok(Some(curve))
}

pub fn line_to_target(line: &drafting::Line, ctx: &ConversionContext) -> Curve {
    Curve::Line(LineCurve {
        start: point_to_target(line.start, ctx),
        end: point_to_target(line.end, ctx),
    })
}

fn check_radius(radius: f64, entity: &'static str) -> Result<(), ConvertError> {
    if radius.is_finite() && radius > 0.0 {
        Ok(())
    } else {
        Err(ConvertError::malformed(
            entity,
            format!("radius {radius} is not positive"),
        ))
    }
}

pub fn circle_to_target(
    circle: &drafting::Circle,
    ctx: &ConversionContext,
) -> Result<Curve, ConvertError> {
    check_radius(circle.radius, "circle")?;
    let plane = ocs_plane(point_to_target(circle.center, ctx), circle.normal, "circle")?;
    Ok(Curve::Arc(ArcCurve::circle(plane, ctx.to_target(circle.radius))))
}

/// 角度原样复制，终止角按逆时针展开到起始角之后。
pub fn arc_to_target(arc: &drafting::Arc, ctx: &ConversionContext) -> Result<Curve, ConvertError> {
    check_radius(arc.radius, "arc")?;
    if !arc.start_angle.is_finite() || !arc.end_angle.is_finite() {
        return Err(ConvertError::malformed("arc", "non-finite angle"));
    }
    let sweep = (arc.end_angle - arc.start_angle).rem_euclid(TAU);
    if sweep <= f64::EPSILON {
        return Err(ConvertError::malformed("arc", "zero sweep angle"));
    }
    let plane = ocs_plane(point_to_target(arc.center, ctx), arc.normal, "arc")?;
    Ok(Curve::Arc(ArcCurve {
        plane,
        radius: ctx.to_target(arc.radius),
        angle: Interval::new(arc.start_angle, arc.start_angle + sweep),
    }))
}

/// 椭圆由圆心与参数化起止点重建，不直接沿用源端参数。
pub fn ellipse_to_target(
    ellipse: &drafting::Ellipse,
    ctx: &ConversionContext,
) -> Result<Curve, ConvertError> {
    let major = ellipse.major_axis;
    if major.normalize().is_none() {
        return Err(ConvertError::malformed("ellipse", "degenerate major axis"));
    }
    if !(ellipse.radius_ratio > 0.0 && ellipse.radius_ratio <= 1.0 + 1e-12) {
        return Err(ConvertError::malformed(
            "ellipse",
            format!("radius ratio {} out of (0, 1]", ellipse.radius_ratio),
        ));
    }
    let minor = ellipse
        .minor_axis()
        .filter(|minor| minor.length() > f64::EPSILON)
        .ok_or_else(|| ConvertError::malformed("ellipse", "degenerate minor axis"))?;
    let (start, end) = ellipse
        .point_at(ellipse.start_param)
        .zip(ellipse.point_at(ellipse.end_param))
        .ok_or_else(|| ConvertError::malformed("ellipse", "degenerate normal vector"))?;

    let parameter_of = |point: Point3| {
        let offset = ellipse.center.vector_to(point);
        let cos = offset.dot(major) / major.length_squared();
        let sin = offset.dot(minor) / minor.length_squared();
        sin.atan2(cos)
    };
    let t0 = parameter_of(start);
    let mut sweep = (parameter_of(end) - t0).rem_euclid(TAU);
    if sweep <= 1e-12 {
        sweep = TAU;
    }

    let curve = BSplineCurve::elliptical_arc(
        point_to_target(ellipse.center, ctx).0,
        vector_to_target(major, ctx).0,
        vector_to_target(minor, ctx).0,
        t0,
        t0 + sweep,
    );
    Ok(Curve::Nurbs(NurbsCurve::from_bspline(&curve)?))
}

/// 节点先在完整曲线上规范化，最后才按源端子区间裁剪。
pub fn spline_to_target(
    spline: &drafting::Spline,
    ctx: &ConversionContext,
) -> Result<Curve, ConvertError> {
    let count = spline.control_points.len();
    if spline.degree == 0 || count <= spline.degree {
        return Err(ConvertError::malformed(
            "spline",
            format!("degree {} with {count} control points", spline.degree),
        ));
    }
    if spline.weights.len() > count {
        return Err(ConvertError::malformed(
            "spline",
            format!("{} weights for {count} control points", spline.weights.len()),
        ));
    }

    let knots = nurbs::full_to_compact(&spline.knots, spline.degree, count)?;
    let mut curve = NurbsCurve {
        degree: spline.degree,
        points: spline
            .control_points
            .iter()
            .map(|p| point_to_target(*p, ctx))
            .collect(),
        weights: (0..count)
            .map(|index| spline.weights.get(index).copied().unwrap_or(1.0))
            .collect(),
        knots,
    };

    if let Some(domain) = spline.domain {
        let full = curve
            .domain()
            .ok_or_else(|| ConvertError::malformed("spline", "empty knot vector"))?;
        let untouched =
            nurbs::same_knot(domain.start, full.start) && nurbs::same_knot(domain.end, full.end);
        if !untouched {
            if !domain.is_increasing() {
                return Err(ConvertError::malformed(
                    "spline",
                    format!("trim domain {:?} is not increasing", domain),
                ));
            }
            let trimmed = curve.to_bspline()?.trim(domain.start, domain.end)?;
            curve = NurbsCurve::from_bspline(&trimmed)?;
        }
    }
    Ok(Curve::Nurbs(curve))
}

/// 按段类型逐段转换；重合段、单点段等未知类型跳过。
pub fn polyline_to_target(
    polyline: &drafting::Polyline,
    ctx: &ConversionContext,
) -> Result<Option<Curve>, ConvertError> {
    let ocs = polyline
        .ocs_plane()
        .ok_or_else(|| ConvertError::malformed("polyline", "degenerate normal vector"))?;

    let mut segments = Vec::with_capacity(polyline.segment_count());
    for index in 0..polyline.segment_count() {
        let Some((start, end, bulge)) = polyline.segment(index) else {
            continue;
        };
        match polyline.segment_type(index) {
            SegmentType::Line => segments.push(Curve::Line(LineCurve {
                start: point_to_target(ocs.point_at_2d(start), ctx),
                end: point_to_target(ocs.point_at_2d(end), ctx),
            })),
            SegmentType::Arc => segments.push(Curve::Arc(bulge_arc(&ocs, start, end, bulge, ctx))),
            other => debug!(index, segment = ?other, "跳过多段线段"),
        }
    }

    if segments.is_empty() {
        return Ok(None);
    }
    Ok(Some(Curve::PolyCurve(PolyCurve { segments })))
}

/// 凸度圆弧。顺时针（凸度为负）时翻转平面，使角度区间保持递增。
pub(crate) fn bulge_arc(
    ocs: &Plane,
    start: Point2,
    end: Point2,
    bulge: f64,
    ctx: &ConversionContext,
) -> ArcCurve {
    let chord = end.0 - start.0;
    let left = DVec2::new(-chord.y, chord.x) / chord.length();
    let offset = chord.length() / 2.0 * (1.0 - bulge * bulge) / (2.0 * bulge);
    let center = (start.0 + end.0) * 0.5 + left * offset;
    let sweep = 4.0 * bulge.abs().atan();
    let radius = (start.0 - center).length();

    let base = ocs.with_origin(ocs.point_at(center.x, center.y));
    let (plane, flip) = if bulge > 0.0 {
        (base, 1.0)
    } else {
        (base.flipped(), -1.0)
    };
    let relative = start.0 - center;
    let start_angle = (flip * relative.y).atan2(relative.x);

    ArcCurve {
        plane: plane_to_target(&plane, ctx),
        radius: ctx.to_target(radius),
        angle: Interval::new(start_angle, start_angle + sweep),
    }
}

pub fn polyline3d_to_target(
    polyline: &drafting::Polyline3d,
    ctx: &ConversionContext,
) -> Option<Curve> {
    if polyline.vertices.len() < 2 {
        return None;
    }
    let mut points: Vec<Point3> = polyline
        .vertices
        .iter()
        .map(|p| point_to_target(*p, ctx))
        .collect();
    if polyline.is_closed {
        points.push(points[0]);
    }
    Some(Curve::Polyline(PolylineCurve { points }))
}

pub fn composite_to_target(
    composite: &drafting::CompositeCurve,
    ctx: &ConversionContext,
) -> Result<Option<Curve>, ConvertError> {
    let mut segments = Vec::with_capacity(composite.segments.len());
    for segment in &composite.segments {
        match curve_to_target(segment, ctx)? {
            Some(curve) => segments.push(curve),
            None => debug!(segment = segment.type_name(), "跳过复合曲线中的未知段"),
        }
    }
    if segments.is_empty() {
        return Ok(None);
    }
    Ok(Some(Curve::PolyCurve(PolyCurve { segments })))
}

/// 自由曲面端曲线转回绘图端实体；未支持类型返回 `Ok(None)`。
pub fn curve_to_source(
    curve: &Curve,
    ctx: &ConversionContext,
) -> Result<Option<Entity>, ConvertError> {
    let entity = match curve {
        Curve::Line(line) => Entity::Line(drafting::Line {
            start: point_to_source(line.start, ctx),
            end: point_to_source(line.end, ctx),
        }),
        Curve::Arc(arc) => arc_to_source(arc, ctx),
        Curve::Nurbs(nurbs) => Entity::Spline(bspline_to_spline(&nurbs.to_bspline()?, ctx)),
        Curve::PolyCurve(poly) => return poly_curve_to_source(poly, ctx),
        Curve::Polyline(polyline) => return Ok(polyline_curve_to_source(polyline, ctx)),
        Curve::Unsupported { type_name } => {
            debug!(curve = %type_name, "无法转换的曲线类型");
            return Ok(None);
        }
    };
    Ok(Some(entity))
}

fn arc_to_source(arc: &ArcCurve, ctx: &ConversionContext) -> Entity {
    let center = point_to_source(arc.plane.origin, ctx);
    let radius = ctx.to_source(arc.radius);
    if arc.is_circle() {
        return Entity::Circle(drafting::Circle {
            center,
            normal: arc.plane.z_axis,
            radius,
        });
    }
    let rotation = ocs_rotation(&arc.plane);
    Entity::Arc(drafting::Arc {
        center,
        normal: arc.plane.z_axis,
        radius,
        start_angle: (arc.angle.start + rotation).rem_euclid(TAU),
        end_angle: (arc.angle.end + rotation).rem_euclid(TAU),
    })
}

/// B 样条写成绘图端样条（完整节点约定）。
pub(crate) fn bspline_to_spline(curve: &BSplineCurve, ctx: &ConversionContext) -> drafting::Spline {
    let control_points: Vec<Point3> = curve
        .locations()
        .into_iter()
        .map(|p| point_to_source(Point3(p), ctx))
        .collect();
    let is_closed = curve.start_point().distance(curve.end_point()) <= ctx.tolerance;
    drafting::Spline {
        degree: curve.degree,
        control_points,
        weights: if curve.is_rational() {
            curve.weights()
        } else {
            Vec::new()
        },
        knots: curve.knots.clone(),
        is_periodic: false,
        is_closed,
        domain: None,
    }
}

/// 平面直线/圆弧组成的多段曲线写成凸度多段线，其余情况合并为单条样条。
fn poly_curve_to_source(
    poly: &PolyCurve,
    ctx: &ConversionContext,
) -> Result<Option<Entity>, ConvertError> {
    if poly.segments.is_empty() {
        return Ok(None);
    }
    if let Some(polyline) = planar_bulge_polyline(poly, ctx) {
        return Ok(Some(Entity::Polyline(polyline)));
    }

    let mut parts = Vec::with_capacity(poly.segments.len());
    for segment in &poly.segments {
        if let Some(part) = segment.to_bspline(ctx.tolerance)? {
            parts.push(part.clamped()?);
        }
    }
    if parts.is_empty() {
        return Ok(None);
    }
    let joined = BSplineCurve::join(&parts, ctx.tolerance)?;
    debug!(segments = parts.len(), degree = joined.degree, "多段曲线合并为样条");
    Ok(Some(Entity::Spline(bspline_to_spline(&joined, ctx))))
}

fn planar_bulge_polyline(poly: &PolyCurve, ctx: &ConversionContext) -> Option<drafting::Polyline> {
    let mut normal = None;
    let mut points = Vec::with_capacity(poly.segments.len() + 1);
    for segment in &poly.segments {
        match segment {
            Curve::Arc(arc) if !arc.is_circle() => {
                normal.get_or_insert(arc.plane.z_axis);
            }
            Curve::Line(_) => {}
            _ => return None,
        }
        points.push(segment.start_point()?);
    }
    points.push(poly.segments.last()?.end_point()?);

    let normal = match normal {
        Some(normal) => normal,
        None => plane_normal(&points, ctx.tolerance)?,
    };
    let ocs = Plane::from_normal(Point3::ORIGIN, normal)?;
    let elevation = ocs.distance_to(points[0]);
    if points
        .iter()
        .any(|p| (ocs.distance_to(*p) - elevation).abs() > ctx.tolerance)
    {
        return None;
    }
    for pair in poly.segments.windows(2) {
        let gap = pair[0].end_point()?.distance_to(pair[1].start_point()?);
        if gap > ctx.tolerance {
            return None;
        }
    }

    let mut vertices = Vec::with_capacity(points.len());
    for (segment, start) in poly.segments.iter().zip(&points) {
        let bulge = match segment {
            Curve::Arc(arc) => {
                let alignment = arc.plane.z_axis.dot(normal);
                if (alignment.abs() - 1.0).abs() > 1e-9 {
                    return None;
                }
                (arc.angle.length() / 4.0).tan() * alignment.signum()
            }
            _ => 0.0,
        };
        let local = ocs.project(point_to_source(*start, ctx));
        vertices.push(drafting::PolylineVertex::with_bulge(local, bulge));
    }

    let first = points[0];
    let last = points[points.len() - 1];
    let is_closed = poly.segments.len() > 1 && first.distance_to(last) <= ctx.tolerance;
    if !is_closed {
        vertices.push(drafting::PolylineVertex::new(
            ocs.project(point_to_source(last, ctx)),
        ));
    }

    Some(drafting::Polyline {
        vertices,
        is_closed,
        elevation: ctx.to_source(elevation),
        normal,
    })
}

/// 只含直线的点列所在平面的法向量；共线时若垂直于 Z 轴则取 Z 轴。
fn plane_normal(points: &[Point3], tolerance: f64) -> Option<Vector3> {
    let origin = points[0];
    let direction = points
        .iter()
        .map(|p| origin.vector_to(*p))
        .find(|v| v.length() > tolerance)?;
    let normal = points
        .iter()
        .map(|p| direction.cross(origin.vector_to(*p)))
        .find(|n| n.length() > tolerance * direction.length())
        .and_then(Vector3::normalize);
    match normal {
        Some(normal) if normal.0.z < 0.0 => Some(Vector3(-normal.0)),
        Some(normal) => Some(normal),
        None if direction.0.z.abs() <= tolerance => Some(Vector3::Z),
        None => None,
    }
}

fn polyline_curve_to_source(polyline: &PolylineCurve, ctx: &ConversionContext) -> Option<Entity> {
    if polyline.points.len() < 2 {
        return None;
    }
    let mut vertices: Vec<Point3> = polyline
        .points
        .iter()
        .map(|p| point_to_source(*p, ctx))
        .collect();
    let is_closed = vertices.len() > 2
        && polyline.points[0].distance_to(polyline.points[polyline.points.len() - 1])
            <= ctx.tolerance;
    if is_closed {
        vertices.pop();
    }
    Some(Entity::Polyline3d(drafting::Polyline3d {
        vertices,
        is_closed,
    }))
}

#[cfg(test)]
mod tests {
    use std::f64::consts::{FRAC_PI_2, PI};
    use std::sync::Arc;

    use cadlink_core::drafting::PolylineVertex;
    use cadlink_core::units::LengthUnit;

    use super::*;
    use crate::units::UnitScale;

    fn identity() -> ConversionContext {
        ConversionContext::default()
    }

    fn meters_to_mm() -> ConversionContext {
        let scale =
            UnitScale::resolve(LengthUnit::Meters, LengthUnit::Millimeters, LengthUnit::Unset)
                .unwrap();
        ConversionContext::new(Arc::new(scale))
    }

    fn expect_nurbs(curve: Curve) -> NurbsCurve {
        match curve {
            Curve::Nurbs(nurbs) => nurbs,
            other => panic!("期望 NURBS 曲线，得到 {other:?}"),
        }
    }

    #[test]
    fn arc_angles_are_copied_verbatim() {
        let arc = drafting::Arc {
            center: Point3::new(1.0, 2.0, 0.0),
            normal: Vector3::Z,
            radius: 2.0,
            start_angle: 1.5 * PI,
            end_angle: 0.25 * PI,
        };
        let Curve::Arc(target) = arc_to_target(&arc, &meters_to_mm()).unwrap() else {
            panic!("期望圆弧");
        };
        assert_eq!(target.angle.start, 1.5 * PI);
        assert!((target.angle.end - 2.25 * PI).abs() < 1e-12);
        assert!((target.radius - 2000.0).abs() < 1e-9);

        let Some(Entity::Arc(back)) = curve_to_source(&Curve::Arc(target), &meters_to_mm()).unwrap()
        else {
            panic!("期望圆弧实体");
        };
        assert!((back.start_angle - arc.start_angle).abs() < 1e-12);
        assert!((back.end_angle - arc.end_angle).abs() < 1e-12);
        assert!((back.radius - 2.0).abs() < 1e-12);
    }

    #[test]
    fn full_arc_maps_back_to_circle() {
        let circle = drafting::Circle {
            center: Point3::new(0.0, 0.0, 3.0),
            normal: Vector3::new(0.0, 1.0, 0.0),
            radius: 4.0,
        };
        let target = circle_to_target(&circle, &identity()).unwrap();
        let Some(Entity::Circle(back)) = curve_to_source(&target, &identity()).unwrap() else {
            panic!("期望圆实体");
        };
        assert!((back.radius - 4.0).abs() < 1e-12);
        assert!((back.normal.0 - circle.normal.0).length() < 1e-12);
    }

    #[test]
    fn degenerate_ellipse_is_malformed() {
        let ellipse = drafting::Ellipse {
            center: Point3::ORIGIN,
            normal: Vector3::Z,
            major_axis: Vector3::new(0.0, 0.0, 0.0),
            radius_ratio: 0.5,
            start_param: 0.0,
            end_param: TAU,
        };
        let err = ellipse_to_target(&ellipse, &identity()).unwrap_err();
        assert!(matches!(err, ConvertError::Malformed { entity: "ellipse", .. }));
    }

    #[test]
    fn half_ellipse_is_rebuilt_from_end_points() {
        let ellipse = drafting::Ellipse {
            center: Point3::new(1.0, 0.0, 0.0),
            normal: Vector3::Z,
            major_axis: Vector3::new(2.0, 0.0, 0.0),
            radius_ratio: 0.5,
            start_param: 0.0,
            end_param: PI,
        };
        let nurbs = expect_nurbs(ellipse_to_target(&ellipse, &identity()).unwrap());
        assert_eq!(nurbs.degree, 2);
        assert_eq!(nurbs.knots.len(), nurbs.points.len() + 1);
        let curve = nurbs.to_bspline().unwrap();
        let (t0, t1) = curve.domain();
        assert!(curve.point_at(t0).distance(glam::DVec3::new(3.0, 0.0, 0.0)) < 1e-9);
        assert!(curve.point_at(t1).distance(glam::DVec3::new(-1.0, 0.0, 0.0)) < 1e-9);
        let top = curve.point_at(t0 + FRAC_PI_2);
        assert!(top.distance(glam::DVec3::new(1.0, 1.0, 0.0)) < 1e-9);
    }

    #[test]
    fn ellipse_axes_scale_with_units() {
        let ellipse = drafting::Ellipse {
            center: Point3::new(1.0, 0.0, 0.0),
            normal: Vector3::Z,
            major_axis: Vector3::new(2.0, 0.0, 0.0),
            radius_ratio: 0.5,
            start_param: 0.0,
            end_param: PI,
        };
        let nurbs = expect_nurbs(ellipse_to_target(&ellipse, &meters_to_mm()).unwrap());
        let curve = nurbs.to_bspline().unwrap();
        let (t0, t1) = curve.domain();
        assert!(curve.point_at(t0).distance(glam::DVec3::new(3000.0, 0.0, 0.0)) < 1e-6);
        assert!(curve.point_at(t1).distance(glam::DVec3::new(-1000.0, 0.0, 0.0)) < 1e-6);
        let top = curve.point_at(t0 + FRAC_PI_2);
        assert!(top.distance(glam::DVec3::new(1000.0, 1000.0, 0.0)) < 1e-6);
    }

    fn cubic_spline(domain: Option<Interval>) -> drafting::Spline {
        drafting::Spline {
            degree: 3,
            control_points: vec![
                Point3::new(0.0, 0.0, 0.0),
                Point3::new(1.0, 2.0, 0.0),
                Point3::new(2.0, -1.0, 0.0),
                Point3::new(4.0, 1.0, 0.0),
                Point3::new(5.0, 0.0, 1.0),
                Point3::new(6.0, 2.0, 1.0),
            ],
            weights: vec![1.0, 2.0],
            knots: vec![0.0, 0.0, 0.0, 0.0, 1.0, 2.0, 3.0, 3.0, 3.0, 3.0],
            is_periodic: false,
            is_closed: false,
            domain,
        }
    }

    #[test]
    fn spline_knots_use_compact_convention() {
        let spline = cubic_spline(None);
        let nurbs = expect_nurbs(spline_to_target(&spline, &meters_to_mm()).unwrap());
        assert_eq!(nurbs.knots, vec![0.0, 0.0, 0.0, 1.0, 2.0, 3.0, 3.0, 3.0]);
        assert_eq!(nurbs.weights, vec![1.0, 2.0, 1.0, 1.0, 1.0, 1.0]);
        for (source, target) in spline.control_points.iter().zip(&nurbs.points) {
            assert!((target.0 - source.0 * 1000.0).length() < 1e-9);
        }

        let Some(Entity::Spline(back)) =
            curve_to_source(&Curve::Nurbs(nurbs), &meters_to_mm()).unwrap()
        else {
            panic!("期望样条实体");
        };
        assert_eq!(back.knots, spline.knots);
        assert_eq!(back.weights.len(), 6);
        assert!(back.control_points[3].distance_to(spline.control_points[3]) < 1e-9);
    }

    #[test]
    fn spline_is_trimmed_after_knot_normalization() {
        let spline = cubic_spline(Some(Interval::new(0.5, 2.5)));
        let nurbs = expect_nurbs(spline_to_target(&spline, &identity()).unwrap());
        let domain = nurbs.domain().unwrap();
        assert!((domain.start - 0.5).abs() < 1e-12);
        assert!((domain.end - 2.5).abs() < 1e-12);
        assert_eq!(nurbs.knots.len(), nurbs.points.len() + 2);

        let full = expect_nurbs(spline_to_target(&cubic_spline(None), &identity()).unwrap());
        let expected = full.to_bspline().unwrap().point_at(1.7);
        let actual = nurbs.to_bspline().unwrap().point_at(1.7);
        assert!(expected.distance(actual) < 1e-9);
    }

    #[test]
    fn spline_with_wrong_knot_count_is_malformed() {
        let mut spline = cubic_spline(None);
        spline.knots.pop();
        assert!(matches!(
            spline_to_target(&spline, &identity()),
            Err(ConvertError::Knot(_))
        ));
    }

    fn bulge_polyline(bulge: f64) -> drafting::Polyline {
        drafting::Polyline {
            vertices: vec![
                PolylineVertex::with_bulge(Point2::new(0.0, 0.0), bulge),
                PolylineVertex::new(Point2::new(10.0, 0.0)),
                PolylineVertex::new(Point2::new(10.0, 0.0)),
                PolylineVertex::new(Point2::new(10.0, 10.0)),
            ],
            is_closed: false,
            elevation: 2.0,
            normal: Vector3::Z,
        }
    }

    #[test]
    fn polyline_bulges_become_arcs() {
        for (bulge, mid_y) in [(1.0, -5.0), (-1.0, 5.0)] {
            let curve = polyline_to_target(&bulge_polyline(bulge), &identity())
                .unwrap()
                .unwrap();
            let Curve::PolyCurve(poly) = curve else {
                panic!("期望多段曲线");
            };
            assert_eq!(poly.segments.len(), 2, "重合段应被跳过");
            let Curve::Arc(arc) = &poly.segments[0] else {
                panic!("期望圆弧段");
            };
            assert!(arc.angle.is_increasing());
            assert!(arc.start_point().distance_to(Point3::new(0.0, 0.0, 2.0)) < 1e-9);
            assert!(arc.end_point().distance_to(Point3::new(10.0, 0.0, 2.0)) < 1e-9);
            let mid = arc.point_at_angle((arc.angle.start + arc.angle.end) / 2.0);
            assert!(mid.distance_to(Point3::new(5.0, mid_y, 2.0)) < 1e-9);
        }
    }

    #[test]
    fn planar_poly_curve_maps_back_to_bulge_polyline() {
        let poly = polyline_to_target(&bulge_polyline(1.0), &identity())
            .unwrap()
            .unwrap();
        let Some(Entity::Polyline(back)) = curve_to_source(&poly, &identity()).unwrap() else {
            panic!("期望多段线");
        };
        assert_eq!(back.vertices.len(), 3);
        assert!((back.vertices[0].bulge - 1.0).abs() < 1e-9);
        assert!(back.vertices[1].bulge.abs() < 1e-12);
        assert!((back.elevation - 2.0).abs() < 1e-12);
        assert!(!back.is_closed);
    }

    #[test]
    fn non_planar_poly_curve_degrades_to_spline() {
        let poly = Curve::PolyCurve(PolyCurve {
            segments: vec![
                Curve::Line(LineCurve {
                    start: Point3::new(0.0, 0.0, 0.0),
                    end: Point3::new(1.0, 0.0, 0.0),
                }),
                Curve::Line(LineCurve {
                    start: Point3::new(1.0, 0.0, 0.0),
                    end: Point3::new(1.0, 1.0, 0.0),
                }),
                Curve::Line(LineCurve {
                    start: Point3::new(1.0, 1.0, 0.0),
                    end: Point3::new(1.0, 1.0, 1.0),
                }),
            ],
        });
        let Some(Entity::Spline(spline)) = curve_to_source(&poly, &identity()).unwrap() else {
            panic!("期望样条");
        };
        assert_eq!(spline.degree, 1);
        assert_eq!(spline.control_points.len(), 4);
        assert_eq!(spline.knots.len(), 6);
        assert!(spline.control_points[3].distance_to(Point3::new(1.0, 1.0, 1.0)) < 1e-12);
    }

    #[test]
    fn unsupported_curves_have_no_result() {
        let curve = Curve::Unsupported {
            type_name: "SubDEdgeCurve".to_string(),
        };
        assert!(curve_to_source(&curve, &identity()).unwrap().is_none());
        let entity = Entity::Unsupported {
            type_name: "Helix".to_string(),
        };
        assert!(curve_to_target(&entity, &identity()).unwrap().is_none());
    }
}
