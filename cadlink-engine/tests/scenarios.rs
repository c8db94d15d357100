use std::sync::Arc;

use cadlink_core::{
    drafting::{Circle, Document, Entity, Line, Spline},
    freeform::{Curve, Geometry},
    geometry::{Point3, Vector3},
    units::LengthUnit,
};
use cadlink_engine::{
    ConversionContext, ConverterRegistry, UnitScale, UnitSystemManager, demo::populate_demo,
};

fn context(source: LengthUnit, target: LengthUnit) -> ConversionContext {
    let scale = UnitScale::resolve(source, target, LengthUnit::Unset).expect("单位应可解析");
    ConversionContext::new(Arc::new(scale))
}

fn line(x: f64) -> Entity {
    Entity::Line(Line {
        start: Point3::new(x, 0.0, 0.0),
        end: Point3::new(x + 10.0, 0.0, 0.0),
    })
}

#[test]
fn line_is_scaled_by_unit_ratio() {
    let registry = ConverterRegistry::with_defaults();
    let ctx = context(LengthUnit::Inches, LengthUnit::Millimeters);
    let converted = registry
        .convert_to_target(&line(0.0), &ctx)
        .expect("直线转换失败");
    assert_eq!(converted.len(), 1);
    let Geometry::Curve(Curve::Line(result)) = &converted[0] else {
        panic!("应得到直线: {:?}", converted[0]);
    };
    assert!(result.start.distance_to(Point3::new(0.0, 0.0, 0.0)) < 1e-12);
    assert!(result.end.distance_to(Point3::new(254.0, 0.0, 0.0)) < 1e-9);
}

#[test]
fn batch_skips_unsupported_entities() {
    let registry = ConverterRegistry::with_defaults();
    let mut entities: Vec<Entity> = (0..9).map(|i| line(i as f64 * 20.0)).collect();
    entities.insert(
        4,
        Entity::Unsupported {
            type_name: "AcDbRasterImage".to_string(),
        },
    );

    let report = registry.convert_batch_to_target(&entities, &ConversionContext::default());
    assert_eq!(report.converted.len(), 9);
    assert_eq!(report.skipped.len(), 1);
    assert_eq!(report.skipped[0].index, 4);
    assert_eq!(report.skipped[0].type_name, "AcDbRasterImage");
    assert!(report.failed.is_empty());
}

#[test]
fn batch_failure_does_not_abort_remaining_items() {
    let registry = ConverterRegistry::with_defaults();
    let entities = vec![
        line(0.0),
        Entity::Circle(Circle {
            center: Point3::ORIGIN,
            normal: Vector3::Z,
            radius: 0.0,
        }),
        line(5.0),
    ];
    let report = registry.convert_batch_to_target(&entities, &ConversionContext::default());
    assert_eq!(report.converted.len(), 2);
    assert_eq!(report.failed.len(), 1);
    assert_eq!(report.failed[0].index, 1);
}

#[test]
fn spline_knots_survive_a_round_trip() {
    let registry = ConverterRegistry::with_defaults();
    let ctx = context(LengthUnit::Meters, LengthUnit::Millimeters);
    let knots = vec![0.0, 0.0, 0.0, 0.0, 0.25, 0.5, 1.0, 1.0, 1.0, 1.0];
    let spline = Entity::Spline(Spline {
        degree: 3,
        control_points: vec![
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(1.0, 2.0, 0.0),
            Point3::new(2.0, -1.0, 0.0),
            Point3::new(3.0, 1.0, 0.0),
            Point3::new(4.0, 0.0, 1.0),
            Point3::new(5.0, 0.5, 0.0),
        ],
        weights: Vec::new(),
        knots: knots.clone(),
        is_periodic: false,
        is_closed: false,
        domain: None,
    });

    let forward = registry
        .convert_to_target(&spline, &ctx)
        .expect("样条转换失败");
    let Geometry::Curve(Curve::Nurbs(curve)) = &forward[0] else {
        panic!("应得到 NURBS 曲线");
    };
    assert_eq!(curve.knots.len(), 6 + 3 - 1);
    assert!((curve.points[1].y() - 2000.0).abs() < 1e-9);

    let back = registry
        .convert_to_source(&forward[0], &ctx)
        .expect("反向转换失败");
    let Entity::Spline(result) = &back[0] else {
        panic!("应得到样条: {:?}", back[0]);
    };
    assert_eq!(result.knots.len(), knots.len());
    for (a, b) in result.knots.iter().zip(&knots) {
        assert!((a - b).abs() < 1e-9, "节点不一致: {a} != {b}");
    }
    assert!(result.control_points[4].distance_to(Point3::new(4.0, 0.0, 1.0)) < 1e-9);
}

#[test]
fn unit_change_applies_to_new_contexts_only() {
    let manager =
        UnitSystemManager::new(LengthUnit::Meters, LengthUnit::Meters, LengthUnit::Unset)
            .expect("单位管理器创建失败");
    let registry = ConverterRegistry::with_defaults();
    let before = ConversionContext::new(manager.snapshot());

    manager
        .units_changed(LengthUnit::Meters, LengthUnit::Centimeters)
        .expect("单位切换失败");
    let after = ConversionContext::new(manager.snapshot());

    let end_x = |ctx: &ConversionContext| {
        let converted = registry.convert_to_target(&line(0.0), ctx).expect("转换失败");
        match &converted[0] {
            Geometry::Curve(Curve::Line(result)) => result.end.x(),
            other => panic!("应得到直线: {other:?}"),
        }
    };
    assert!((end_x(&before) - 10.0).abs() < 1e-12);
    assert!((end_x(&after) - 1000.0).abs() < 1e-9);
}

#[test]
fn demo_document_round_trips_without_failures() {
    let mut document = Document::with_units(LengthUnit::Millimeters);
    populate_demo(&mut document);
    let registry = ConverterRegistry::with_defaults();
    let ctx = context(LengthUnit::Millimeters, LengthUnit::Meters);

    let forward = registry.convert_batch_to_target(
        document.entities().map(|(_, entity)| entity),
        &ctx,
    );
    assert!(forward.is_clean(), "正向转换失败: {:?}", forward.failed);

    let backward = registry.convert_batch_to_source(&forward.converted, &ctx);
    assert!(backward.failed.is_empty(), "反向转换失败: {:?}", backward.failed);
    assert!(backward.converted.len() >= document.len());
}
