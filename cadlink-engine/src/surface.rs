//! NURBS 曲面转换，节点规范化按 U、V 方向分别进行。

use cadlink_core::{
    drafting::{Entity, NurbSurface, PlanarPatch},
    freeform::NurbsSurface,
    geometry::Point3,
    nurbs,
};

use crate::context::ConversionContext;
use crate::errors::ConvertError;
use crate::primitive::{point_to_source, point_to_target};

fn check_grid(
    degree_u: usize,
    degree_v: usize,
    count_u: usize,
    count_v: usize,
    points: usize,
    weights: usize,
) -> Result<(), ConvertError> {
    if degree_u == 0 || degree_v == 0 || count_u <= degree_u || count_v <= degree_v {
        return Err(ConvertError::malformed(
            "surface",
            format!("degree {degree_u}x{degree_v} with {count_u}x{count_v} control points"),
        ));
    }
    if points != count_u * count_v {
        return Err(ConvertError::malformed(
            "surface",
            format!("{points} control points for a {count_u}x{count_v} grid"),
        ));
    }
    if weights > points {
        return Err(ConvertError::malformed(
            "surface",
            format!("{weights} weights for {points} control points"),
        ));
    }
    Ok(())
}

/// 控制点逐个按位置复制，缺失的权重取 1.0。
pub fn surface_to_target(
    surface: &NurbSurface,
    ctx: &ConversionContext,
) -> Result<NurbsSurface, ConvertError> {
    check_grid(
        surface.degree_u,
        surface.degree_v,
        surface.count_u,
        surface.count_v,
        surface.control_points.len(),
        surface.weights.len(),
    )?;
    Ok(NurbsSurface {
        degree_u: surface.degree_u,
        degree_v: surface.degree_v,
        count_u: surface.count_u,
        count_v: surface.count_v,
        points: surface
            .control_points
            .iter()
            .map(|p| point_to_target(*p, ctx))
            .collect(),
        weights: (0..surface.control_points.len())
            .map(|index| surface.weights.get(index).copied().unwrap_or(1.0))
            .collect(),
        knots_u: nurbs::full_to_compact(&surface.knots_u, surface.degree_u, surface.count_u)?,
        knots_v: nurbs::full_to_compact(&surface.knots_v, surface.degree_v, surface.count_v)?,
    })
}

pub fn surface_to_source(
    surface: &NurbsSurface,
    ctx: &ConversionContext,
) -> Result<NurbSurface, ConvertError> {
    check_grid(
        surface.degree_u,
        surface.degree_v,
        surface.count_u,
        surface.count_v,
        surface.points.len(),
        surface.weights.len(),
    )?;
    Ok(NurbSurface {
        degree_u: surface.degree_u,
        degree_v: surface.degree_v,
        count_u: surface.count_u,
        count_v: surface.count_v,
        control_points: surface
            .points
            .iter()
            .map(|p| point_to_source(*p, ctx))
            .collect(),
        weights: if surface.is_rational() {
            surface.weights.clone()
        } else {
            Vec::new()
        },
        knots_u: nurbs::compact_to_full(&surface.knots_u, surface.degree_u, surface.count_u)?,
        knots_v: nurbs::compact_to_full(&surface.knots_v, surface.degree_v, surface.count_v)?,
    })
}

/// 平面面片写作双一次 NURBS 面。
pub fn planar_patch_to_target(patch: &PlanarPatch, ctx: &ConversionContext) -> NurbsSurface {
    let corner = |u: f64, v: f64| {
        point_to_target(
            Point3(patch.origin.0 + patch.u_edge.0 * u + patch.v_edge.0 * v),
            ctx,
        )
    };
    NurbsSurface {
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
        weights: vec![1.0; 4],
        knots_u: vec![0.0, 1.0],
        knots_v: vec![0.0, 1.0],
    }
}

/// Brep 或 Brep 替身的各个面转为独立的绘图端曲面实体。
pub fn faces_to_source(
    faces: &[NurbsSurface],
    ctx: &ConversionContext,
) -> Result<Vec<Entity>, ConvertError> {
    faces
        .iter()
        .map(|face| surface_to_source(face, ctx).map(Entity::NurbSurface))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::units::UnitScale;
    use cadlink_core::geometry::Vector3;
    use cadlink_core::units::LengthUnit;
    use std::sync::Arc;

    fn bicubic_by_quadratic() -> NurbSurface {
        let mut control_points = Vec::new();
        for u in 0..4 {
            for v in 0..3 {
                control_points.push(Point3::new(u as f64, v as f64, ((u + v) % 2) as f64));
            }
        }
        NurbSurface {
            degree_u: 3,
            degree_v: 2,
            count_u: 4,
            count_v: 3,
            control_points,
            weights: Vec::new(),
            knots_u: vec![0.0, 0.0, 0.0, 0.0, 1.0, 1.0, 1.0, 1.0],
            knots_v: vec![0.0, 0.0, 0.0, 1.0, 1.0, 1.0],
        }
    }

    #[test]
    fn surface_knots_normalize_per_direction() {
        let ctx = ConversionContext::new(Arc::new(
            UnitScale::resolve(LengthUnit::Centimeters, LengthUnit::Millimeters, LengthUnit::Unset)
                .unwrap(),
        ));
        let surface = bicubic_by_quadratic();
        let target = surface_to_target(&surface, &ctx).unwrap();
        assert_eq!(target.knots_u, vec![0.0, 0.0, 0.0, 1.0, 1.0, 1.0]);
        assert_eq!(target.knots_v, vec![0.0, 0.0, 1.0, 1.0]);
        assert_eq!(target.weights, vec![1.0; 12]);
        for (index, point) in target.points.iter().enumerate() {
            let source = surface.control_points[index];
            assert!((point.0 - source.0 * 10.0).length() < 1e-12);
        }

        let back = surface_to_source(&target, &ctx).unwrap();
        assert_eq!(back.knots_u, surface.knots_u);
        assert_eq!(back.knots_v, surface.knots_v);
        assert!(back.weights.is_empty());
        assert!(back.control_points[7].distance_to(surface.control_points[7]) < 1e-12);
    }

    #[test]
    fn grid_size_mismatch_is_malformed() {
        let mut surface = bicubic_by_quadratic();
        surface.control_points.pop();
        let err = surface_to_target(&surface, &ConversionContext::default()).unwrap_err();
        assert!(matches!(err, ConvertError::Malformed { entity: "surface", .. }));
    }

    #[test]
    fn planar_patch_spans_its_edges() {
        let patch = PlanarPatch {
            origin: Point3::new(1.0, 1.0, 0.0),
            u_edge: Vector3::new(2.0, 0.0, 0.0),
            v_edge: Vector3::new(0.0, 3.0, 0.0),
        };
        let surface = planar_patch_to_target(&patch, &ConversionContext::default());
        assert_eq!(surface.point(1, 1), Some(Point3::new(3.0, 4.0, 0.0)));
        let back = surface_to_source(&surface, &ConversionContext::default()).unwrap();
        assert_eq!(back.knots_u, vec![0.0, 0.0, 1.0, 1.0]);
    }
}
