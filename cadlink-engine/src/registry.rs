//! 转换器注册表：类型标签到转换函数的静态表，启动时一次建好。

use std::collections::HashMap;

use cadlink_core::{drafting::Entity, freeform::Geometry};
use tracing::{debug, info, warn};

use crate::annotation::{
    dimension_to_source, dimension_to_target, leader_to_source, leader_to_target,
    mleader_to_target,
};
use crate::context::ConversionContext;
use crate::curve::{curve_to_source, curve_to_target};
use crate::errors::ConvertError;
use crate::hatch::{hatch_to_source, hatch_to_target};
use crate::mesh::{mesh_to_polyface, polyface_to_target, subd_to_target};
use crate::primitive::{point_to_source, point_to_target};
use crate::solid::solid_to_proxy;
use crate::surface::{faces_to_source, surface_to_source, surface_to_target};
use crate::text::{mtext_to_target, text_to_source, text_to_target};

pub type ToTargetFn = fn(&Entity, &ConversionContext) -> Result<Vec<Geometry>, ConvertError>;
pub type ToSourceFn = fn(&Geometry, &ConversionContext) -> Result<Vec<Entity>, ConvertError>;

#[derive(Debug, Clone)]
pub struct SkippedItem {
    pub index: usize,
    pub type_name: String,
}

#[derive(Debug)]
pub struct FailedItem {
    pub index: usize,
    pub type_name: String,
    pub error: ConvertError,
}

/// 批量转换结果：每个输入要么转换成功，要么被跳过，要么失败，批次本身不中断。
#[derive(Debug)]
pub struct BatchReport<T> {
    pub converted: Vec<T>,
    pub skipped: Vec<SkippedItem>,
    pub failed: Vec<FailedItem>,
}

impl<T> Default for BatchReport<T> {
    fn default() -> Self {
        Self {
            converted: Vec::new(),
            skipped: Vec::new(),
            failed: Vec::new(),
        }
    }
}

impl<T> BatchReport<T> {
    #[inline]
    pub fn is_clean(&self) -> bool {
        self.skipped.is_empty() && self.failed.is_empty()
    }
}

pub struct ConverterRegistry {
    to_target: HashMap<&'static str, ToTargetFn>,
    to_source: HashMap<&'static str, ToSourceFn>,
}

impl ConverterRegistry {
    /// 空表。
    pub fn new() -> Self {
        Self {
            to_target: HashMap::new(),
            to_source: HashMap::new(),
        }
    }

    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        for tag in [
            "line",
            "circle",
            "arc",
            "ellipse",
            "spline",
            "polyline",
            "polyline3d",
            "composite_curve",
        ] {
            registry.register_to_target(tag, curve_entity_to_target);
        }
        registry.register_to_target("point", point_entity_to_target);
        registry.register_to_target("nurb_surface", surface_entity_to_target);
        registry.register_to_target("polyface_mesh", mesh_entity_to_target);
        registry.register_to_target("subd_mesh", mesh_entity_to_target);
        registry.register_to_target("solid3d", solid_entity_to_target);
        registry.register_to_target("text", text_entity_to_target);
        registry.register_to_target("mtext", text_entity_to_target);
        registry.register_to_target("hatch", hatch_entity_to_target);
        registry.register_to_target("dimension", dimension_entity_to_target);
        registry.register_to_target("leader", leader_entity_to_target);
        registry.register_to_target("mleader", leader_entity_to_target);

        for tag in [
            "line_curve",
            "arc_curve",
            "nurbs_curve",
            "poly_curve",
            "polyline_curve",
        ] {
            registry.register_to_source(tag, curve_geometry_to_source);
        }
        registry.register_to_source("point", point_geometry_to_source);
        registry.register_to_source("nurbs_surface", surface_geometry_to_source);
        registry.register_to_source("mesh", mesh_geometry_to_source);
        registry.register_to_source("brep", brep_geometry_to_source);
        registry.register_to_source("brep_proxy", brep_geometry_to_source);
        registry.register_to_source("text", text_geometry_to_source);
        registry.register_to_source("hatch", hatch_geometry_to_source);
        registry.register_to_source("dimension", dimension_geometry_to_source);
        registry.register_to_source("leader", leader_geometry_to_source);
        registry
    }

    /// 同一标签重复注册时替换原有函数。
    pub fn register_to_target(&mut self, tag: &'static str, convert: ToTargetFn) {
        if self.to_target.insert(tag, convert).is_some() {
            debug!(tag, "替换已注册的正向转换器");
        }
    }

    pub fn register_to_source(&mut self, tag: &'static str, convert: ToSourceFn) {
        if self.to_source.insert(tag, convert).is_some() {
            debug!(tag, "替换已注册的反向转换器");
        }
    }

    pub fn supports_to_target(&self, tag: &str) -> bool {
        self.to_target.contains_key(tag)
    }

    pub fn supports_to_source(&self, tag: &str) -> bool {
        self.to_source.contains_key(tag)
    }

    /// 未注册的类型返回空列表。
    pub fn convert_to_target(
        &self,
        entity: &Entity,
        ctx: &ConversionContext,
    ) -> Result<Vec<Geometry>, ConvertError> {
        match self.to_target.get(entity.type_tag()) {
            Some(convert) => convert(entity, ctx),
            None => {
                debug!(entity = entity.type_name(), "没有对应的正向转换器");
                Ok(Vec::new())
            }
        }
    }

    pub fn convert_to_source(
        &self,
        geometry: &Geometry,
        ctx: &ConversionContext,
    ) -> Result<Vec<Entity>, ConvertError> {
        match self.to_source.get(geometry.type_tag()) {
            Some(convert) => convert(geometry, ctx),
            None => {
                debug!(geometry = geometry.type_tag(), "没有对应的反向转换器");
                Ok(Vec::new())
            }
        }
    }

    pub fn convert_batch_to_target<'a>(
        &self,
        entities: impl IntoIterator<Item = &'a Entity>,
        ctx: &ConversionContext,
    ) -> BatchReport<Geometry> {
        let report = run_batch(entities, |entity| {
            (
                entity.type_name().to_string(),
                self.convert_to_target(entity, ctx),
            )
        });
        log_report("正向", &report);
        report
    }

    pub fn convert_batch_to_source<'a>(
        &self,
        objects: impl IntoIterator<Item = &'a Geometry>,
        ctx: &ConversionContext,
    ) -> BatchReport<Entity> {
        let report = run_batch(objects, |geometry| {
            (
                geometry.type_tag().to_string(),
                self.convert_to_source(geometry, ctx),
            )
        });
        log_report("反向", &report);
        report
    }
}

impl Default for ConverterRegistry {
    fn default() -> Self {
        Self::with_defaults()
    }
}

fn run_batch<I, T, F>(items: impl IntoIterator<Item = I>, mut convert: F) -> BatchReport<T>
where
    F: FnMut(I) -> (String, Result<Vec<T>, ConvertError>),
{
    let mut report = BatchReport::default();
    for (index, item) in items.into_iter().enumerate() {
        let (type_name, result) = convert(item);
        match result {
            Ok(converted) if converted.is_empty() => {
                report.skipped.push(SkippedItem { index, type_name });
            }
            Ok(converted) => report.converted.extend(converted),
            Err(error) => {
                warn!(index, object = %type_name, error = %error, "转换失败");
                report.failed.push(FailedItem {
                    index,
                    type_name,
                    error,
                });
            }
        }
    }
    report
}

fn log_report<T>(direction: &str, report: &BatchReport<T>) {
    info!(
        direction,
        converted = report.converted.len(),
        skipped = report.skipped.len(),
        failed = report.failed.len(),
        "批量转换完成"
    );
}

fn curve_entity_to_target(
    entity: &Entity,
    ctx: &ConversionContext,
) -> Result<Vec<Geometry>, ConvertError> {
    Ok(curve_to_target(entity, ctx)?
        .map(Geometry::Curve)
        .into_iter()
        .collect())
}

fn point_entity_to_target(
    entity: &Entity,
    ctx: &ConversionContext,
) -> Result<Vec<Geometry>, ConvertError> {
    let Entity::Point(point) = entity else {
        return Ok(Vec::new());
    };
    Ok(vec![Geometry::Point {
        location: point_to_target(point.position, ctx),
    }])
}

fn surface_entity_to_target(
    entity: &Entity,
    ctx: &ConversionContext,
) -> Result<Vec<Geometry>, ConvertError> {
    let Entity::NurbSurface(surface) = entity else {
        return Ok(Vec::new());
    };
    Ok(vec![Geometry::Surface(surface_to_target(surface, ctx)?)])
}

fn mesh_entity_to_target(
    entity: &Entity,
    ctx: &ConversionContext,
) -> Result<Vec<Geometry>, ConvertError> {
    let mesh = match entity {
        Entity::PolyFaceMesh(mesh) => polyface_to_target(mesh, ctx)?,
        Entity::SubDMesh(mesh) => subd_to_target(mesh, ctx)?,
        _ => return Ok(Vec::new()),
    };
    Ok(vec![Geometry::Mesh(mesh)])
}

/// 注册表走同步路径，实体只生成 Brep 替身。
fn solid_entity_to_target(
    entity: &Entity,
    ctx: &ConversionContext,
) -> Result<Vec<Geometry>, ConvertError> {
    let Entity::Solid3d(solid) = entity else {
        return Ok(Vec::new());
    };
    Ok(vec![Geometry::BrepProxy(solid_to_proxy(solid, ctx)?)])
}

fn text_entity_to_target(
    entity: &Entity,
    ctx: &ConversionContext,
) -> Result<Vec<Geometry>, ConvertError> {
    let text = match entity {
        Entity::Text(text) => text_to_target(text, ctx)?,
        Entity::MText(mtext) => mtext_to_target(mtext, ctx)?,
        _ => return Ok(Vec::new()),
    };
    Ok(vec![Geometry::Text(text)])
}

fn hatch_entity_to_target(
    entity: &Entity,
    ctx: &ConversionContext,
) -> Result<Vec<Geometry>, ConvertError> {
    let Entity::Hatch(hatch) = entity else {
        return Ok(Vec::new());
    };
    Ok(vec![Geometry::Hatch(hatch_to_target(hatch, ctx)?)])
}

fn dimension_entity_to_target(
    entity: &Entity,
    ctx: &ConversionContext,
) -> Result<Vec<Geometry>, ConvertError> {
    let Entity::Dimension(dimension) = entity else {
        return Ok(Vec::new());
    };
    Ok(vec![Geometry::Dimension(dimension_to_target(dimension, ctx)?)])
}

fn leader_entity_to_target(
    entity: &Entity,
    ctx: &ConversionContext,
) -> Result<Vec<Geometry>, ConvertError> {
    let leaders = match entity {
        Entity::Leader(leader) => leader_to_target(leader, ctx)?.into_iter().collect(),
        Entity::MLeader(mleader) => mleader_to_target(mleader, ctx)?,
        _ => Vec::new(),
    };
    Ok(leaders.into_iter().map(Geometry::Leader).collect())
}

fn curve_geometry_to_source(
    geometry: &Geometry,
    ctx: &ConversionContext,
) -> Result<Vec<Entity>, ConvertError> {
    let Geometry::Curve(curve) = geometry else {
        return Ok(Vec::new());
    };
    Ok(curve_to_source(curve, ctx)?.into_iter().collect())
}

fn point_geometry_to_source(
    geometry: &Geometry,
    ctx: &ConversionContext,
) -> Result<Vec<Entity>, ConvertError> {
    let Geometry::Point { location } = geometry else {
        return Ok(Vec::new());
    };
    Ok(vec![Entity::Point(cadlink_core::drafting::PointEntity {
        position: point_to_source(*location, ctx),
    })])
}

fn surface_geometry_to_source(
    geometry: &Geometry,
    ctx: &ConversionContext,
) -> Result<Vec<Entity>, ConvertError> {
    let Geometry::Surface(surface) = geometry else {
        return Ok(Vec::new());
    };
    Ok(vec![Entity::NurbSurface(surface_to_source(surface, ctx)?)])
}

fn mesh_geometry_to_source(
    geometry: &Geometry,
    ctx: &ConversionContext,
) -> Result<Vec<Entity>, ConvertError> {
    let Geometry::Mesh(mesh) = geometry else {
        return Ok(Vec::new());
    };
    Ok(vec![Entity::PolyFaceMesh(mesh_to_polyface(mesh, ctx)?)])
}

/// 同步反向路径：每个面成为独立曲面实体，拓扑丢失。
fn brep_geometry_to_source(
    geometry: &Geometry,
    ctx: &ConversionContext,
) -> Result<Vec<Entity>, ConvertError> {
    match geometry {
        Geometry::Brep(brep) => faces_to_source(&brep.faces, ctx),
        Geometry::BrepProxy(proxy) => faces_to_source(&proxy.faces, ctx),
        _ => Ok(Vec::new()),
    }
}

fn text_geometry_to_source(
    geometry: &Geometry,
    ctx: &ConversionContext,
) -> Result<Vec<Entity>, ConvertError> {
    let Geometry::Text(text) = geometry else {
        return Ok(Vec::new());
    };
    Ok(vec![Entity::MText(text_to_source(text, ctx)?)])
}

fn hatch_geometry_to_source(
    geometry: &Geometry,
    ctx: &ConversionContext,
) -> Result<Vec<Entity>, ConvertError> {
    let Geometry::Hatch(hatch) = geometry else {
        return Ok(Vec::new());
    };
    Ok(vec![Entity::Hatch(hatch_to_source(hatch, ctx)?)])
}

fn dimension_geometry_to_source(
    geometry: &Geometry,
    ctx: &ConversionContext,
) -> Result<Vec<Entity>, ConvertError> {
    let Geometry::Dimension(dimension) = geometry else {
        return Ok(Vec::new());
    };
    Ok(vec![Entity::Dimension(dimension_to_source(dimension, ctx)?)])
}

fn leader_geometry_to_source(
    geometry: &Geometry,
    ctx: &ConversionContext,
) -> Result<Vec<Entity>, ConvertError> {
    let Geometry::Leader(leader) = geometry else {
        return Ok(Vec::new());
    };
    Ok(leader_to_source(leader, ctx).into_iter().collect())
}

#[cfg(test)]
mod tests {
    use cadlink_core::drafting::{Line, PointEntity};
    use cadlink_core::freeform::{Curve, LineCurve};
    use cadlink_core::geometry::Point3;

    use super::*;

    fn line() -> Entity {
        Entity::Line(Line {
            start: Point3::ORIGIN,
            end: Point3::new(1.0, 0.0, 0.0),
        })
    }

    #[test]
    fn defaults_cover_both_directions() {
        let registry = ConverterRegistry::with_defaults();
        for tag in ["line", "spline", "solid3d", "mtext", "hatch", "mleader"] {
            assert!(registry.supports_to_target(tag), "缺少正向转换器: {tag}");
        }
        for tag in ["nurbs_curve", "brep", "brep_proxy", "text", "dimension"] {
            assert!(registry.supports_to_source(tag), "缺少反向转换器: {tag}");
        }
        assert!(!registry.supports_to_target("unsupported"));
    }

    #[test]
    fn unknown_tags_yield_empty_results() {
        let registry = ConverterRegistry::with_defaults();
        let entity = Entity::Unsupported {
            type_name: "AcDbRasterImage".to_string(),
        };
        let converted = registry
            .convert_to_target(&entity, &ConversionContext::default())
            .unwrap();
        assert!(converted.is_empty());
    }

    fn always_point(_: &Entity, _: &ConversionContext) -> Result<Vec<Geometry>, ConvertError> {
        Ok(vec![Geometry::Point {
            location: Point3::ORIGIN,
        }])
    }

    #[test]
    fn registering_again_replaces_the_entry() {
        let mut registry = ConverterRegistry::with_defaults();
        registry.register_to_target("line", always_point);
        let converted = registry
            .convert_to_target(&line(), &ConversionContext::default())
            .unwrap();
        assert!(matches!(converted[0], Geometry::Point { .. }));
    }

    #[test]
    fn batch_reports_failures_without_aborting() {
        let registry = ConverterRegistry::with_defaults();
        let entities = vec![
            line(),
            Entity::Circle(cadlink_core::drafting::Circle {
                center: Point3::ORIGIN,
                normal: cadlink_core::geometry::Vector3::Z,
                radius: -1.0,
            }),
            Entity::Point(PointEntity {
                position: Point3::new(1.0, 2.0, 3.0),
            }),
        ];
        let report = registry.convert_batch_to_target(&entities, &ConversionContext::default());
        assert_eq!(report.converted.len(), 2);
        assert_eq!(report.failed.len(), 1);
        assert_eq!(report.failed[0].index, 1);
        assert!(matches!(
            report.failed[0].error,
            ConvertError::Malformed { entity: "circle", .. }
        ));

        let back = registry.convert_batch_to_source(
            &[Geometry::Curve(Curve::Line(LineCurve {
                start: Point3::ORIGIN,
                end: Point3::new(2.0, 0.0, 0.0),
            }))],
            &ConversionContext::default(),
        );
        assert!(back.is_clean());
        assert!(matches!(back.converted[0], Entity::Line(_)));
    }
}
