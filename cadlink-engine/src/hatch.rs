//! 填充转换：边界环与图案参数。

use std::f64::consts::TAU;

use cadlink_core::{
    drafting::{self, HatchEdge, HatchPattern},
    freeform::{self, ArcCurve, Curve, LineCurve, NurbsCurve, PolyCurve},
    geometry::{Interval, Plane, Point2, Point3, Vector3},
    nurbs::{self, BSplineCurve},
};
use tracing::debug;

use crate::context::ConversionContext;
use crate::curve::bulge_arc;
use crate::errors::ConvertError;
use crate::primitive::{
    plane_to_source, plane_to_target, point_to_source, point_to_target, vector_to_target,
};

/// 源端图案名与目标端图案名对照表，其余名称原样传递。
const PATTERN_TABLE: &[(&str, &str)] = &[
    ("SOLID", "Solid"),
    ("ANSI31", "Hatch1"),
    ("ANSI32", "Hatch2"),
    ("ANSI33", "Hatch3"),
    ("NET", "Grid"),
    ("DASH", "HatchDash"),
];

pub fn pattern_to_target(name: &str) -> String {
    PATTERN_TABLE
        .iter()
        .find(|(source, _)| source.eq_ignore_ascii_case(name))
        .map_or_else(|| name.to_string(), |(_, target)| (*target).to_string())
}

pub fn pattern_to_source(name: &str) -> String {
    PATTERN_TABLE
        .iter()
        .find(|(_, target)| target.eq_ignore_ascii_case(name))
        .map_or_else(|| name.to_string(), |(source, _)| (*source).to_string())
}

/// 起止角之间的扫掠角；首尾重合视为整圆。
fn sweep_between(from: f64, to: f64) -> f64 {
    let sweep = (to - from).rem_euclid(TAU);
    if sweep <= 1e-12 { TAU } else { sweep }
}

fn on_plane(ocs: &Plane, point: Point2, ctx: &ConversionContext) -> Point3 {
    point_to_target(ocs.point_at_2d(point), ctx)
}

/// 圆弧边。顺时针时改用翻转平面，角度取反后仍按逆时针递增。
fn arc_edge(
    ocs: &Plane,
    center: Point2,
    radius: f64,
    start_angle: f64,
    end_angle: f64,
    is_counter_clockwise: bool,
    ctx: &ConversionContext,
) -> Result<Curve, ConvertError> {
    if !(radius.is_finite() && radius > 0.0) {
        return Err(ConvertError::malformed(
            "hatch",
            format!("arc edge radius {radius} is not positive"),
        ));
    }
    let base = ocs.with_origin(ocs.point_at_2d(center));
    let (plane, angle) = if is_counter_clockwise {
        (
            base,
            Interval::new(start_angle, start_angle + sweep_between(start_angle, end_angle)),
        )
    } else {
        (
            base.flipped(),
            Interval::new(-start_angle, -start_angle + sweep_between(end_angle, start_angle)),
        )
    };
    Ok(Curve::Arc(ArcCurve {
        plane: plane_to_target(&plane, ctx),
        radius: ctx.to_target(radius),
        angle,
    }))
}

#[allow(clippy::too_many_arguments)]
fn ellipse_edge(
    ocs: &Plane,
    center: Point2,
    major_axis: Point2,
    minor_ratio: f64,
    start_angle: f64,
    end_angle: f64,
    is_counter_clockwise: bool,
    ctx: &ConversionContext,
) -> Result<Curve, ConvertError> {
    let major = Vector3(ocs.x_axis.0 * major_axis.x() + ocs.y_axis.0 * major_axis.y());
    if major.normalize().is_none() || !(minor_ratio > 0.0 && minor_ratio.is_finite()) {
        return Err(ConvertError::malformed("hatch", "degenerate ellipse edge"));
    }
    let minor = ocs.z_axis.cross(major).0 * minor_ratio;
    let (minor, t0, sweep) = if is_counter_clockwise {
        (minor, start_angle, sweep_between(start_angle, end_angle))
    } else {
        (-minor, -start_angle, sweep_between(end_angle, start_angle))
    };
    let curve = BSplineCurve::elliptical_arc(
        on_plane(ocs, center, ctx).0,
        vector_to_target(major, ctx).0,
        vector_to_target(Vector3(minor), ctx).0,
        t0,
        t0 + sweep,
    );
    Ok(Curve::Nurbs(NurbsCurve::from_bspline(&curve)?))
}

fn spline_edge(
    ocs: &Plane,
    control_points: &[Point2],
    weights: &[f64],
    knot_values: &[f64],
    degree: usize,
    ctx: &ConversionContext,
) -> Result<Curve, ConvertError> {
    if weights.len() > control_points.len() {
        return Err(ConvertError::malformed(
            "hatch",
            format!(
                "{} weights for {} spline edge control points",
                weights.len(),
                control_points.len()
            ),
        ));
    }
    Ok(Curve::Nurbs(NurbsCurve {
        degree,
        points: control_points
            .iter()
            .map(|p| on_plane(ocs, *p, ctx))
            .collect(),
        weights: (0..control_points.len())
            .map(|index| weights.get(index).copied().unwrap_or(1.0))
            .collect(),
        knots: nurbs::full_to_compact(knot_values, degree, control_points.len())?,
    }))
}

fn edge_to_target(
    ocs: &Plane,
    edge: &HatchEdge,
    ctx: &ConversionContext,
) -> Result<Option<Curve>, ConvertError> {
    let curve = match edge {
        HatchEdge::Line { start, end } => Curve::Line(LineCurve {
            start: on_plane(ocs, *start, ctx),
            end: on_plane(ocs, *end, ctx),
        }),
        HatchEdge::PolylineSegment { start, end, bulge } => {
            if start.vector_to(*end).length() <= 1e-12 {
                return Ok(None);
            }
            if bulge.abs() <= 1e-12 {
                Curve::Line(LineCurve {
                    start: on_plane(ocs, *start, ctx),
                    end: on_plane(ocs, *end, ctx),
                })
            } else {
                Curve::Arc(bulge_arc(ocs, *start, *end, *bulge, ctx))
            }
        }
        HatchEdge::Arc {
            center,
            radius,
            start_angle,
            end_angle,
            is_counter_clockwise,
        } => arc_edge(
            ocs,
            *center,
            *radius,
            *start_angle,
            *end_angle,
            *is_counter_clockwise,
            ctx,
        )?,
        HatchEdge::Ellipse {
            center,
            major_axis,
            minor_ratio,
            start_angle,
            end_angle,
            is_counter_clockwise,
        } => ellipse_edge(
            ocs,
            *center,
            *major_axis,
            *minor_ratio,
            *start_angle,
            *end_angle,
            *is_counter_clockwise,
            ctx,
        )?,
        HatchEdge::Spline {
            control_points,
            weights,
            knot_values,
            degree,
        } => spline_edge(ocs, control_points, weights, knot_values, *degree, ctx)?,
        HatchEdge::BoundaryReference { handle } => {
            debug!(handle = %handle, "跳过关联边界引用");
            return Ok(None);
        }
    };
    Ok(Some(curve))
}

/// 每个边界环在填充平面内写成一条多段曲线，内外属性保留。
pub fn hatch_to_target(
    hatch: &drafting::Hatch,
    ctx: &ConversionContext,
) -> Result<freeform::Hatch, ConvertError> {
    let ocs = hatch
        .ocs_plane()
        .ok_or_else(|| ConvertError::malformed("hatch", "degenerate normal vector"))?;

    let mut loops = Vec::with_capacity(hatch.loops.len());
    for (index, source) in hatch.loops.iter().enumerate() {
        let mut segments = Vec::with_capacity(source.edges.len());
        for edge in &source.edges {
            if let Some(curve) = edge_to_target(&ocs, edge, ctx)? {
                segments.push(curve);
            }
        }
        if segments.is_empty() {
            debug!(index, "边界环没有可转换的边");
            continue;
        }
        loops.push(freeform::HatchLoop {
            curve: Curve::PolyCurve(PolyCurve { segments }),
            is_outer: source.is_outer,
        });
    }

    Ok(freeform::Hatch {
        plane: plane_to_target(&ocs, ctx),
        loops,
        pattern: pattern_to_target(&hatch.pattern.name),
        rotation: hatch.pattern.angle,
        scale: hatch.pattern.scale,
        is_solid: hatch.pattern.is_solid,
    })
}

/// 把曲线展开为填充 OCS 内的边；`ocs` 为源端单位。
fn curve_to_edges(
    curve: &Curve,
    ocs: &Plane,
    ctx: &ConversionContext,
    edges: &mut Vec<HatchEdge>,
) -> Result<(), ConvertError> {
    let local = |point: Point3| ocs.project(point_to_source(point, ctx));
    match curve {
        Curve::Line(line) => edges.push(HatchEdge::Line {
            start: local(line.start),
            end: local(line.end),
        }),
        Curve::Arc(arc) => edges.push(arc_to_edge(arc, ocs, ctx)),
        Curve::Nurbs(nurbs) => {
            let count = nurbs.points.len();
            edges.push(HatchEdge::Spline {
                control_points: nurbs.points.iter().map(|p| local(*p)).collect(),
                weights: if nurbs.is_rational() {
                    nurbs.weights.clone()
                } else {
                    Vec::new()
                },
                knot_values: nurbs::compact_to_full(&nurbs.knots, nurbs.degree, count)?,
                degree: nurbs.degree,
            });
        }
        Curve::PolyCurve(poly) => {
            for segment in &poly.segments {
                curve_to_edges(segment, ocs, ctx, edges)?;
            }
        }
        Curve::Polyline(polyline) => {
            for pair in polyline.points.windows(2) {
                edges.push(HatchEdge::Line {
                    start: local(pair[0]),
                    end: local(pair[1]),
                });
            }
        }
        Curve::Unsupported { type_name } => {
            debug!(curve = %type_name, "填充边界中的曲线无法转换");
        }
    }
    Ok(())
}

/// 圆弧平面法向与 OCS 同向时为逆时针边，否则在翻转坐标系中取角度。
fn arc_to_edge(arc: &ArcCurve, ocs: &Plane, ctx: &ConversionContext) -> HatchEdge {
    let is_counter_clockwise = arc.plane.z_axis.dot(ocs.z_axis) >= 0.0;
    let frame = if is_counter_clockwise {
        *ocs
    } else {
        ocs.flipped()
    };
    let phase = arc
        .plane
        .x_axis
        .dot(frame.y_axis)
        .atan2(arc.plane.x_axis.dot(frame.x_axis));
    let sweep = arc.angle.length();
    let first = phase + arc.angle.start;
    let (start_angle, end_angle) = if is_counter_clockwise {
        let start = first.rem_euclid(TAU);
        (start, start + sweep)
    } else {
        let start = (-first).rem_euclid(TAU);
        (start, start - sweep)
    };
    HatchEdge::Arc {
        center: ocs.project(point_to_source(arc.plane.origin, ctx)),
        radius: ctx.to_source(arc.radius),
        start_angle,
        end_angle,
        is_counter_clockwise,
    }
}

pub fn hatch_to_source(
    hatch: &freeform::Hatch,
    ctx: &ConversionContext,
) -> Result<drafting::Hatch, ConvertError> {
    let plane = plane_to_source(&hatch.plane, ctx);
    let normal = plane.z_axis;
    let ocs = Plane::from_normal(Point3::ORIGIN, normal)
        .ok_or_else(|| ConvertError::malformed("hatch", "degenerate plane normal"))?;
    let elevation = plane.origin.0.dot(ocs.z_axis.0);
    let ocs = ocs.with_origin(Point3(ocs.z_axis.0 * elevation));

    let mut loops = Vec::with_capacity(hatch.loops.len());
    for source in &hatch.loops {
        let mut edges = Vec::new();
        curve_to_edges(&source.curve, &ocs, ctx, &mut edges)?;
        if edges.is_empty() {
            continue;
        }
        loops.push(drafting::HatchLoop {
            is_outer: source.is_outer,
            is_polyline: false,
            edges,
        });
    }

    Ok(drafting::Hatch {
        pattern: HatchPattern {
            name: pattern_to_source(&hatch.pattern),
            scale: hatch.scale,
            angle: hatch.rotation,
            is_solid: hatch.is_solid,
        },
        normal,
        elevation,
        loops,
    })
}
