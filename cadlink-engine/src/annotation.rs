//! 标注与引线转换。
//!
//! 标注由定义点和重建的平面还原：平面原点取第一个定义点，法向量取实体记录的法向量，
//! X 轴取 OCS 的 X 轴（旋转标注再绕法向量转过旋转角，对齐标注沿两条尺寸界线起点连线）。

use cadlink_core::{
    drafting::{self, DimensionKind, Entity, LeaderLine, MLeaderContent},
    freeform::{
        self, AngularDimension, AngularMeasure, Dimension, DimensionText, LinearDimension,
        OrdinateAxis, OrdinateDimension, RadialDimension,
    },
    geometry::{Plane, Point2, Point3, Vector3},
};
use glam::DVec2;
use tracing::debug;

use crate::context::ConversionContext;
use crate::errors::ConvertError;
use crate::primitive::{
    ocs_plane, ocs_rotation, plane_to_source, plane_to_target, point2_to_source,
    point2_to_target,
};
use crate::text::{escape_mtext, mtext_to_plain};

/// 平面内的局部坐标，换算到目标单位。
fn local(plane: &Plane, point: Point3, ctx: &ConversionContext) -> Point2 {
    point2_to_target(plane.project(point), ctx)
}

fn dimension_text(
    dim: &drafting::Dimension,
    plane: &Plane,
    scale_measurement: bool,
    ctx: &ConversionContext,
) -> DimensionText {
    DimensionText {
        user_text: dim.text_override.clone(),
        text_point: dim.text_position.map(|p| local(plane, p, ctx)),
        measurement: dim.measurement.map(|value| {
            if scale_measurement {
                ctx.to_target(value)
            } else {
                value
            }
        }),
        style: dim.style_name.clone(),
    }
}

/// 两条直线（各由两点给出）在平面内的交点；平行时返回 `None`。
fn line_intersection(p1: DVec2, p2: DVec2, q1: DVec2, q2: DVec2) -> Option<DVec2> {
    let d1 = p2 - p1;
    let d2 = q2 - q1;
    let cross = d1.perp_dot(d2);
    if cross.abs() <= 1e-12 * d1.length() * d2.length() {
        return None;
    }
    let t = (q1 - p1).perp_dot(d2) / cross;
    Some(p1 + d1 * t)
}

pub fn dimension_to_target(
    dim: &drafting::Dimension,
    ctx: &ConversionContext,
) -> Result<Dimension, ConvertError> {
    let converted = match &dim.kind {
        DimensionKind::Rotated {
            xline1,
            xline2,
            dim_line_point,
            rotation,
        } => {
            let plane = ocs_plane(*xline1, dim.normal, "rotated dimension")?.rotated(*rotation);
            Dimension::Linear(LinearDimension {
                plane: plane_to_target(&plane, ctx),
                ext1: local(&plane, *xline1, ctx),
                ext2: local(&plane, *xline2, ctx),
                dim_line: local(&plane, *dim_line_point, ctx),
                aligned: false,
                text: dimension_text(dim, &plane, true, ctx),
            })
        }
        DimensionKind::Aligned {
            xline1,
            xline2,
            dim_line_point,
        } => {
            let plane = Plane::from_x_axis(*xline1, xline1.vector_to(*xline2), dim.normal)
                .ok_or_else(|| {
                    ConvertError::malformed("aligned dimension", "extension lines coincide")
                })?;
            Dimension::Linear(LinearDimension {
                plane: plane_to_target(&plane, ctx),
                ext1: local(&plane, *xline1, ctx),
                ext2: local(&plane, *xline2, ctx),
                dim_line: local(&plane, *dim_line_point, ctx),
                aligned: true,
                text: dimension_text(dim, &plane, true, ctx),
            })
        }
        DimensionKind::LineAngular {
            xline1_start,
            xline1_end,
            xline2_start,
            xline2_end,
            arc_point,
        } => {
            let plane = ocs_plane(*xline1_start, dim.normal, "angular dimension")?;
            let project = |p: &Point3| plane.project(*p).0;
            let center = line_intersection(
                project(xline1_start),
                project(xline1_end),
                project(xline2_start),
                project(xline2_end),
            )
            .ok_or_else(|| {
                ConvertError::malformed("angular dimension", "extension lines are parallel")
            })?;
            Dimension::Angular(AngularDimension {
                plane: plane_to_target(&plane, ctx),
                center: point2_to_target(Point2(center), ctx),
                def1: local(&plane, *xline1_end, ctx),
                def2: local(&plane, *xline2_end, ctx),
                arc_point: local(&plane, *arc_point, ctx),
                measure: AngularMeasure::Angle,
                text: dimension_text(dim, &plane, false, ctx),
            })
        }
        DimensionKind::Point3Angular {
            center,
            xline1,
            xline2,
            arc_point,
        }
        | DimensionKind::ArcLength {
            center,
            xline1,
            xline2,
            arc_point,
        } => {
            let is_arc_length = matches!(dim.kind, DimensionKind::ArcLength { .. });
            let plane = ocs_plane(*center, dim.normal, "angular dimension")?;
            Dimension::Angular(AngularDimension {
                plane: plane_to_target(&plane, ctx),
                center: Point2::new(0.0, 0.0),
                def1: local(&plane, *xline1, ctx),
                def2: local(&plane, *xline2, ctx),
                arc_point: local(&plane, *arc_point, ctx),
                measure: if is_arc_length {
                    AngularMeasure::ArcLength
                } else {
                    AngularMeasure::Angle
                },
                text: dimension_text(dim, &plane, is_arc_length, ctx),
            })
        }
        DimensionKind::Radial {
            center,
            chord_point,
            leader_length,
        } => {
            let plane = ocs_plane(*center, dim.normal, "radial dimension")?;
            radial(dim, &plane, *chord_point, *leader_length, false, ctx)
        }
        DimensionKind::Diametric {
            chord_point,
            far_chord_point,
            leader_length,
        } => {
            // 目标端直径标注以圆心为基准，圆心取两弦点中点。
            let center = chord_point.midpoint(*far_chord_point);
            let plane = ocs_plane(center, dim.normal, "diametric dimension")?;
            radial(dim, &plane, *chord_point, *leader_length, true, ctx)
        }
        DimensionKind::Ordinate {
            origin,
            defining_point,
            leader_end_point,
            uses_x_axis,
        } => {
            let plane = ocs_plane(*origin, dim.normal, "ordinate dimension")?;
            Dimension::Ordinate(OrdinateDimension {
                plane: plane_to_target(&plane, ctx),
                base: Point2::new(0.0, 0.0),
                defining: local(&plane, *defining_point, ctx),
                leader: local(&plane, *leader_end_point, ctx),
                axis: if *uses_x_axis {
                    OrdinateAxis::X
                } else {
                    OrdinateAxis::Y
                },
                text: dimension_text(dim, &plane, true, ctx),
            })
        }
    };
    Ok(converted)
}

/// 半径与直径标注共用：尺寸线点沿圆心到弦点方向延伸引线长度。
fn radial(
    dim: &drafting::Dimension,
    plane: &Plane,
    chord_point: Point3,
    leader_length: f64,
    is_diameter: bool,
    ctx: &ConversionContext,
) -> Dimension {
    let radius_point = plane.project(chord_point).0;
    let direction = radius_point.try_normalize().unwrap_or(DVec2::X);
    let dim_line = radius_point + direction * leader_length;
    Dimension::Radial(RadialDimension {
        plane: plane_to_target(plane, ctx),
        center: Point2::new(0.0, 0.0),
        radius_point: point2_to_target(Point2(radius_point), ctx),
        dim_line: point2_to_target(Point2(dim_line), ctx),
        is_diameter,
        text: dimension_text(dim, plane, true, ctx),
    })
}

pub fn dimension_to_source(
    dim: &Dimension,
    ctx: &ConversionContext,
) -> Result<drafting::Dimension, ConvertError> {
    let plane = plane_to_source(dim.plane(), ctx);
    let world = |p: Point2| plane.point_at_2d(point2_to_source(p, ctx));

    let (kind, scale_measurement) = match dim {
        Dimension::Linear(linear) => {
            let xline1 = world(linear.ext1);
            let xline2 = world(linear.ext2);
            let dim_line_point = world(linear.dim_line);
            let kind = if linear.aligned {
                DimensionKind::Aligned {
                    xline1,
                    xline2,
                    dim_line_point,
                }
            } else {
                DimensionKind::Rotated {
                    xline1,
                    xline2,
                    dim_line_point,
                    rotation: ocs_rotation(&plane),
                }
            };
            (kind, true)
        }
        Dimension::Angular(angular) => {
            let center = world(angular.center);
            let xline1 = world(angular.def1);
            let xline2 = world(angular.def2);
            let arc_point = world(angular.arc_point);
            match angular.measure {
                AngularMeasure::Angle => (
                    DimensionKind::Point3Angular {
                        center,
                        xline1,
                        xline2,
                        arc_point,
                    },
                    false,
                ),
                AngularMeasure::ArcLength => (
                    DimensionKind::ArcLength {
                        center,
                        xline1,
                        xline2,
                        arc_point,
                    },
                    true,
                ),
            }
        }
        Dimension::Radial(radial) => {
            let center = world(radial.center);
            let chord_point = world(radial.radius_point);
            let leader_length = ctx.to_source(radial.radius_point.0.distance(radial.dim_line.0));
            let kind = if radial.is_diameter {
                DimensionKind::Diametric {
                    chord_point,
                    far_chord_point: Point3(center.0 * 2.0 - chord_point.0),
                    leader_length,
                }
            } else {
                DimensionKind::Radial {
                    center,
                    chord_point,
                    leader_length,
                }
            };
            (kind, true)
        }
        Dimension::Ordinate(ordinate) => (
            DimensionKind::Ordinate {
                origin: world(ordinate.base),
                defining_point: world(ordinate.defining),
                leader_end_point: world(ordinate.leader),
                uses_x_axis: ordinate.axis == OrdinateAxis::X,
            },
            true,
        ),
    };

    let text = dim.text();
    Ok(drafting::Dimension {
        kind,
        normal: plane.z_axis,
        text_override: text.user_text.clone(),
        text_position: text.text_point.map(world),
        measurement: text.measurement.map(|value| {
            if scale_measurement {
                ctx.to_source(value)
            } else {
                value
            }
        }),
        style_name: text.style.clone(),
    })
}

fn leader_plane(
    vertices: &[Point3],
    normal: Vector3,
    entity: &'static str,
) -> Result<Option<Plane>, ConvertError> {
    match vertices.first() {
        Some(first) if vertices.len() >= 2 => ocs_plane(*first, normal, entity).map(Some),
        _ => Ok(None),
    }
}

/// 顶点少于两个时没有结果。注释只保留纯文本。
pub fn leader_to_target(
    leader: &drafting::Leader,
    ctx: &ConversionContext,
) -> Result<Option<freeform::Leader>, ConvertError> {
    let Some(plane) = leader_plane(&leader.vertices, leader.normal, "leader")? else {
        debug!(vertices = leader.vertices.len(), "引线顶点不足");
        return Ok(None);
    };
    Ok(Some(freeform::Leader {
        plane: plane_to_target(&plane, ctx),
        points: leader
            .vertices
            .iter()
            .map(|p| local(&plane, *p, ctx))
            .collect(),
        text: leader.annotation.as_deref().map(mtext_to_plain),
        has_arrowhead: leader.has_arrowhead,
    }))
}

/// 每条引线各生成一个目标端引线，文字放在第一条上。
pub fn mleader_to_target(
    mleader: &drafting::MLeader,
    ctx: &ConversionContext,
) -> Result<Vec<freeform::Leader>, ConvertError> {
    let mut text = match &mleader.content {
        MLeaderContent::MText { text, .. } => Some(mtext_to_plain(text)),
        MLeaderContent::Block { block_name, .. } => {
            debug!(block = %block_name, "块内容的多重引线不携带文字");
            None
        }
        MLeaderContent::None => None,
    };

    let mut leaders = Vec::with_capacity(mleader.leader_lines.len());
    for line in &mleader.leader_lines {
        let Some(plane) = leader_plane(&line.vertices, mleader.normal, "multileader")? else {
            debug!(vertices = line.vertices.len(), "跳过顶点不足的引线");
            continue;
        };
        leaders.push(freeform::Leader {
            plane: plane_to_target(&plane, ctx),
            points: line.vertices.iter().map(|p| local(&plane, *p, ctx)).collect(),
            text: text.take(),
            has_arrowhead: true,
        });
    }
    Ok(leaders)
}

/// 带文字的引线回到多重引线，其余回到普通引线。
pub fn leader_to_source(leader: &freeform::Leader, ctx: &ConversionContext) -> Option<Entity> {
    if leader.points.len() < 2 {
        return None;
    }
    let plane = plane_to_source(&leader.plane, ctx);
    let vertices: Vec<Point3> = leader
        .points
        .iter()
        .map(|p| plane.point_at_2d(point2_to_source(*p, ctx)))
        .collect();

    let entity = match &leader.text {
        Some(text) => {
            let location = vertices.last().copied().unwrap_or(plane.origin);
            Entity::MLeader(drafting::MLeader {
                leader_lines: vec![LeaderLine { vertices }],
                content: MLeaderContent::MText {
                    text: escape_mtext(text),
                    location,
                },
                normal: plane.z_axis,
                text_height: None,
                has_dogleg: false,
                dogleg_length: None,
            })
        }
        None => Entity::Leader(drafting::Leader {
            vertices,
            normal: plane.z_axis,
            has_arrowhead: leader.has_arrowhead,
            annotation: None,
        }),
    };
    Some(entity)
}
