//! 点、向量与平面的双向转换。点和位移随单位缩放，方向向量不缩放。

use cadlink_core::geometry::{Plane, Point2, Point3, Vector3};

use crate::context::ConversionContext;
use crate::errors::ConvertError;

#[inline]
pub fn point_to_target(point: Point3, ctx: &ConversionContext) -> Point3 {
    Point3(point.0 * ctx.units.factor())
}

#[inline]
pub fn point_to_source(point: Point3, ctx: &ConversionContext) -> Point3 {
    Point3(point.0 / ctx.units.factor())
}

#[inline]
pub fn point2_to_target(point: Point2, ctx: &ConversionContext) -> Point2 {
    Point2(point.0 * ctx.units.factor())
}

#[inline]
pub fn point2_to_source(point: Point2, ctx: &ConversionContext) -> Point2 {
    Point2(point.0 / ctx.units.factor())
}

/// 位移向量，例如椭圆的长短轴。
#[inline]
pub fn vector_to_target(vector: Vector3, ctx: &ConversionContext) -> Vector3 {
    Vector3(vector.0 * ctx.units.factor())
}

#[inline]
pub fn vector_to_source(vector: Vector3, ctx: &ConversionContext) -> Vector3 {
    Vector3(vector.0 / ctx.units.factor())
}

/// 平面只缩放原点。
pub fn plane_to_target(plane: &Plane, ctx: &ConversionContext) -> Plane {
    plane.with_origin(point_to_target(plane.origin, ctx))
}

pub fn plane_to_source(plane: &Plane, ctx: &ConversionContext) -> Plane {
    plane.with_origin(point_to_source(plane.origin, ctx))
}

/// 由法向量重建 OCS 平面（任意轴算法）；法向量退化时视为输入畸形。
pub fn ocs_plane(
    origin: Point3,
    normal: Vector3,
    entity: &'static str,
) -> Result<Plane, ConvertError> {
    Plane::from_normal(origin, normal)
        .ok_or_else(|| ConvertError::malformed(entity, "degenerate normal vector"))
}

/// 平面 X 轴相对其法向量所定 OCS 的 X 轴的转角。
pub fn ocs_rotation(plane: &Plane) -> f64 {
    Plane::from_normal(Point3::ORIGIN, plane.z_axis).map_or(0.0, |ocs| {
        plane.x_axis.dot(ocs.y_axis).atan2(plane.x_axis.dot(ocs.x_axis))
    })
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use cadlink_core::units::LengthUnit;

    use super::*;
    use crate::units::UnitScale;

    fn mm_to_m() -> ConversionContext {
        let scale =
            UnitScale::resolve(LengthUnit::Millimeters, LengthUnit::Meters, LengthUnit::Unset)
                .unwrap();
        ConversionContext::new(Arc::new(scale))
    }

    #[test]
    fn points_scale_and_invert() {
        let ctx = mm_to_m();
        let p = Point3::new(1000.0, -250.0, 5.0);
        let target = point_to_target(p, &ctx);
        assert!((target.x() - 1.0).abs() < 1e-12);
        let back = point_to_source(target, &ctx);
        assert!(back.distance_to(p) < 1e-9);
    }

    #[test]
    fn displacements_scale_and_invert() {
        let ctx = ConversionContext::new(Arc::new(
            UnitScale::resolve(LengthUnit::Centimeters, LengthUnit::Millimeters, LengthUnit::Unset)
                .unwrap(),
        ));
        let axis = Vector3::new(1.0, 2.0, -3.0);
        let scaled = vector_to_target(axis, &ctx);
        assert!((scaled.0 - Vector3::new(10.0, 20.0, -30.0).0).length() < 1e-12);
        let back = vector_to_source(scaled, &ctx);
        assert!((back.0 - axis.0).length() < 1e-12);
    }

    #[test]
    fn planes_keep_unit_axes() {
        let ctx = mm_to_m();
        let plane = ocs_plane(Point3::new(500.0, 0.0, 0.0), Vector3::new(0.0, 1.0, 1.0), "test")
            .unwrap();
        let target = plane_to_target(&plane, &ctx);
        assert!((target.origin.x() - 0.5).abs() < 1e-12);
        assert_eq!(target.x_axis, plane.x_axis);
        assert_eq!(target.z_axis, plane.z_axis);
    }

    #[test]
    fn rotated_plane_reports_its_rotation() {
        let plane = ocs_plane(Point3::ORIGIN, Vector3::Z, "test").unwrap().rotated(0.75);
        assert!((ocs_rotation(&plane) - 0.75).abs() < 1e-12);
    }

    #[test]
    fn degenerate_normal_is_malformed() {
        let err = ocs_plane(Point3::ORIGIN, Vector3::new(0.0, 0.0, 0.0), "circle").unwrap_err();
        assert!(matches!(err, ConvertError::Malformed { entity: "circle", .. }));
    }
}
