//! 演示文档：覆盖各类可转换实体，供命令行演示与集成测试使用。

use std::f64::consts::{FRAC_PI_2, FRAC_PI_4};

use cadlink_core::{
    drafting::{
        Arc, Circle, Dimension, DimensionKind, Document, Entity, EntityId, FaceSurface, Hatch,
        HatchEdge, HatchLoop, HatchPattern, Leader, Line, MText, PlanarPatch, PolyFaceMesh,
        Polyline, PolylineVertex, SolidLump, Solid3d, Spline,
    },
    geometry::{Point2, Point3, Vector3},
};
use tracing::debug;

#[derive(Debug, Clone, Copy)]
pub struct DemoEntities {
    pub baseline: EntityId,
    pub circle: EntityId,
    pub arc: EntityId,
    pub polyline: EntityId,
    pub spline: EntityId,
    pub label: EntityId,
    pub dimension: EntityId,
    pub leader: EntityId,
    pub hatch: EntityId,
    pub mesh: EntityId,
    pub solid: EntityId,
}

fn unit_cube() -> Solid3d {
    let patch = |origin: Point3, u: Vector3, v: Vector3| {
        FaceSurface::Planar(PlanarPatch {
            origin,
            u_edge: u,
            v_edge: v,
        })
    };
    let size = 10.0;
    let x = Vector3::new(size, 0.0, 0.0);
    let y = Vector3::new(0.0, size, 0.0);
    let z = Vector3::new(0.0, 0.0, size);
    Solid3d {
        lumps: vec![SolidLump {
            faces: vec![
                patch(Point3::new(60.0, 0.0, 0.0), x, y),
                patch(Point3::new(60.0, 0.0, size), x, y),
                patch(Point3::new(60.0, 0.0, 0.0), x, z),
                patch(Point3::new(60.0, size, 0.0), x, z),
                patch(Point3::new(60.0, 0.0, 0.0), y, z),
                patch(Point3::new(60.0 + size, 0.0, 0.0), y, z),
            ],
            shared_edges: vec![[0, 2], [0, 3], [0, 4], [0, 5], [1, 2], [1, 3], [1, 4], [1, 5]],
        }],
    }
}

/// 向文档追加演示实体，返回各实体标识。
pub fn populate_demo(document: &mut Document) -> DemoEntities {
    let baseline = document.add_entity(Entity::Line(Line {
        start: Point3::new(0.0, 0.0, 0.0),
        end: Point3::new(100.0, 0.0, 0.0),
    }));
    let circle = document.add_entity(Entity::Circle(Circle {
        center: Point3::new(50.0, 25.0, 0.0),
        normal: Vector3::Z,
        radius: 12.5,
    }));
    let arc = document.add_entity(Entity::Arc(Arc {
        center: Point3::new(20.0, 10.0, 0.0),
        normal: Vector3::Z,
        radius: 7.5,
        start_angle: 0.0,
        end_angle: FRAC_PI_2,
    }));
    let polyline = document.add_entity(Entity::Polyline(Polyline {
        vertices: vec![
            PolylineVertex::new(Point2::new(0.0, 10.0)),
            PolylineVertex::with_bulge(Point2::new(10.0, 20.0), 0.5),
            PolylineVertex::new(Point2::new(25.0, 5.0)),
        ],
        is_closed: false,
        elevation: 0.0,
        normal: Vector3::Z,
    }));
    let spline = document.add_entity(Entity::Spline(Spline {
        degree: 3,
        control_points: vec![
            Point3::new(0.0, 30.0, 0.0),
            Point3::new(10.0, 40.0, 0.0),
            Point3::new(20.0, 25.0, 0.0),
            Point3::new(30.0, 45.0, 0.0),
            Point3::new(40.0, 30.0, 0.0),
        ],
        weights: Vec::new(),
        knots: vec![0.0, 0.0, 0.0, 0.0, 0.5, 1.0, 1.0, 1.0, 1.0],
        is_periodic: false,
        is_closed: false,
        domain: None,
    }));
    let label = document.add_entity(Entity::MText(MText {
        location: Point3::new(5.0, 12.0, 0.0),
        normal: Vector3::Z,
        direction: Vector3::new(FRAC_PI_4.cos(), FRAC_PI_4.sin(), 0.0),
        height: 3.5,
        width: None,
        contents: "{\\fArial|b1|i0;CadLink} 转换示例\\P%%c25".to_string(),
        attachment: 1,
        style_name: None,
    }));
    let dimension = document.add_entity(Entity::Dimension(Dimension {
        kind: DimensionKind::Rotated {
            xline1: Point3::new(0.0, 0.0, 0.0),
            xline2: Point3::new(100.0, 0.0, 0.0),
            dim_line_point: Point3::new(50.0, -10.0, 0.0),
            rotation: 0.0,
        },
        normal: Vector3::Z,
        text_override: None,
        text_position: None,
        measurement: Some(100.0),
        style_name: None,
    }));
    let leader = document.add_entity(Entity::Leader(Leader {
        vertices: vec![Point3::new(50.0, 37.5, 0.0), Point3::new(60.0, 45.0, 0.0)],
        normal: Vector3::Z,
        has_arrowhead: true,
        annotation: Some("R12.5".to_string()),
    }));
    let hatch = document.add_entity(Entity::Hatch(Hatch {
        pattern: HatchPattern {
            name: "ANSI31".to_string(),
            scale: 1.0,
            angle: 0.0,
            is_solid: false,
        },
        normal: Vector3::Z,
        elevation: 0.0,
        loops: vec![HatchLoop {
            is_outer: true,
            is_polyline: true,
            edges: vec![
                HatchEdge::PolylineSegment {
                    start: Point2::new(70.0, 10.0),
                    end: Point2::new(90.0, 10.0),
                    bulge: 0.0,
                },
                HatchEdge::PolylineSegment {
                    start: Point2::new(90.0, 10.0),
                    end: Point2::new(70.0, 10.0),
                    bulge: 1.0,
                },
            ],
        }],
    }));
    let mesh = document.add_entity(Entity::PolyFaceMesh(PolyFaceMesh {
        vertices: vec![
            Point3::new(0.0, -20.0, 0.0),
            Point3::new(10.0, -20.0, 0.0),
            Point3::new(10.0, -10.0, 0.0),
            Point3::new(0.0, -10.0, 0.0),
            Point3::new(5.0, -15.0, 5.0),
        ],
        faces: vec![[1, 2, 5, 0], [2, 3, 5, 0], [3, 4, 5, 0], [4, 1, 5, 0], [1, 4, 3, 2]],
    }));
    let solid = document.add_entity(Entity::Solid3d(unit_cube()));

    let ids = DemoEntities {
        baseline,
        circle,
        arc,
        polyline,
        spline,
        label,
        dimension,
        leader,
        hatch,
        mesh,
        solid,
    };

    debug!(
        baseline = ids.baseline.get(),
        spline = ids.spline.get(),
        solid = ids.solid.get(),
        total = document.len(),
        "已创建演示实体"
    );

    ids
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ConversionContext;
    use crate::registry::ConverterRegistry;

    #[test]
    fn demo_document_converts_cleanly() {
        let mut document = Document::new();
        let ids = populate_demo(&mut document);
        assert_eq!(document.len(), 11);
        assert!(document.entity(ids.hatch).is_some());

        let registry = ConverterRegistry::with_defaults();
        let report = registry.convert_batch_to_target(
            document.entities().map(|(_, entity)| entity),
            &ConversionContext::default(),
        );
        assert!(report.is_clean(), "演示实体应全部可转换: {:?}", report.failed);
        assert_eq!(report.converted.len(), 11);
    }
}
