use std::path::PathBuf;

use cadlink_core::{
    drafting::{Document, Entity, FaceSurface, PlanarPatch, Solid3d, SolidLump},
    freeform::{Geometry, Model},
    geometry::{Point3, Vector3},
    units::LengthUnit,
};
use cadlink_io::{
    BrepExporter, BrepImporter, ExchangeFacade, InterchangeKind, InterchangeWorkspace, IoError,
    SolidExporter, SolidImporter,
};

fn fixture(name: &str) -> PathBuf {
    let mut path = PathBuf::from(env!("CARGO_MANIFEST_DIR"));
    path.push("tests/data");
    path.push(name);
    path
}

fn unit_square(z: f64) -> FaceSurface {
    FaceSurface::Planar(PlanarPatch {
        origin: Point3::new(0.0, 0.0, z),
        u_edge: Vector3::new(1.0, 0.0, 0.0),
        v_edge: Vector3::new(0.0, 1.0, 0.0),
    })
}

#[test]
fn import_fixture_scales_into_model_units() {
    let facade = ExchangeFacade::new();
    let mut model = Model::new(LengthUnit::Millimeters);
    let count = facade
        .import_breps(&fixture("two_bodies.json"), &mut model)
        .expect("导入交换文件失败");
    assert_eq!(count, 2);
    assert_eq!(model.len(), 2);

    let Geometry::Brep(first) = &model.objects()[0] else {
        panic!("期望 Brep 对象");
    };
    assert!(first.is_solid);
    let corner = first.faces[0].point(1, 1).expect("缺少控制点");
    assert!((corner.x() - 2000.0).abs() < 1e-9);
    assert!((corner.y() - 1000.0).abs() < 1e-9);
    assert_eq!(first.faces[0].knots_u, vec![0.0, 1.0]);

    let Geometry::Brep(second) = &model.objects()[1] else {
        panic!("期望 Brep 对象");
    };
    assert!(!second.is_solid);
    let face = &second.faces[0];
    assert_eq!(face.knots_u, vec![0.0, 0.0, 1.0, 1.0]);
    assert!(face.is_rational());
    assert!((face.weights[2] - std::f64::consts::FRAC_1_SQRT_2).abs() < 1e-12);
}

#[test]
fn solid_export_overwrites_fixed_file_name() {
    let dir = tempfile::tempdir().expect("创建临时目录失败");
    let workspace = InterchangeWorkspace::new(dir.path().join("nested/interchange"));
    let path = workspace
        .prepare(InterchangeKind::SolidExport)
        .expect("准备交换目录失败");
    assert!(path.ends_with("solid_export.json"));

    let facade = ExchangeFacade::new();
    let two_lumps = Solid3d {
        lumps: vec![
            SolidLump {
                faces: vec![unit_square(0.0), unit_square(1.0)],
                shared_edges: vec![[0, 1]],
            },
            SolidLump {
                faces: vec![unit_square(5.0)],
                shared_edges: Vec::new(),
            },
        ],
    };
    facade
        .export_solids(&[&two_lumps], LengthUnit::Meters, &path)
        .expect("导出实体失败");

    let mut model = Model::new(LengthUnit::Meters);
    assert_eq!(facade.import_breps(&path, &mut model).unwrap(), 2);

    let single = Solid3d {
        lumps: vec![SolidLump {
            faces: vec![unit_square(0.0)],
            shared_edges: Vec::new(),
        }],
    };
    facade
        .export_solids(&[&single], LengthUnit::Meters, &path)
        .expect("覆盖写入失败");
    let mut model = Model::new(LengthUnit::Meters);
    assert_eq!(facade.import_breps(&path, &mut model).unwrap(), 1);
    assert!(path.exists());
}

#[test]
fn brep_round_trip_into_document_transaction() {
    let dir = tempfile::tempdir().expect("创建临时目录失败");
    let path = dir.path().join(InterchangeKind::BrepExport.file_name());
    let facade = ExchangeFacade::new();

    let mut model = Model::new(LengthUnit::Meters);
    facade
        .import_breps(&fixture("two_bodies.json"), &mut model)
        .unwrap();
    let breps: Vec<_> = model
        .objects()
        .iter()
        .filter_map(|object| match object {
            Geometry::Brep(brep) => Some(brep),
            _ => None,
        })
        .collect();
    facade
        .export_breps(&breps, LengthUnit::Meters, &path)
        .expect("导出 Brep 失败");

    let mut document = Document::with_units(LengthUnit::Centimeters);
    let ids = {
        let mut lock = document.lock();
        let mut transaction = lock.start_transaction();
        let ids = facade
            .import_solids(&path, LengthUnit::Centimeters, &mut transaction)
            .expect("导入实体失败");
        assert_eq!(ids.len(), 2);
        transaction.commit()
    };
    assert_eq!(ids.len(), 2);
    assert!(!document.is_locked());

    let Some(Entity::Solid3d(solid)) = document.entity(ids[1]) else {
        panic!("期望三维实体");
    };
    let FaceSurface::Nurbs(surface) = &solid.lumps[0].faces[0] else {
        panic!("期望 NURBS 面");
    };
    assert_eq!(surface.knots_u, vec![0.0, 0.0, 0.0, 1.0, 1.0, 1.0]);
    assert!((surface.control_points[4].x() - 200.0).abs() < 1e-9);
}

#[test]
fn malformed_face_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("broken.json");
    std::fs::write(
        &path,
        r#"{"format":"cadlink-exchange","version":1,"unit":"meters","bodies":[{"faces":[
            {"degree_u":1,"degree_v":1,"count_u":2,"count_v":2,
             "points":[[0,0,0,1]],"knots_u":[0,0,1,1],"knots_v":[0,0,1,1]}]}]}"#,
    )
    .unwrap();
    let mut model = Model::new(LengthUnit::Meters);
    let err = ExchangeFacade::new()
        .import_breps(&path, &mut model)
        .unwrap_err();
    assert!(matches!(err, IoError::InvalidDocument(_)));
    assert!(model.is_empty());
}

#[test]
fn missing_file_reports_read_error() {
    let dir = tempfile::tempdir().unwrap();
    let mut model = Model::new(LengthUnit::Meters);
    let err = ExchangeFacade::new()
        .import_breps(&dir.path().join("absent.json"), &mut model)
        .unwrap_err();
    assert!(matches!(err, IoError::ReadError { .. }));
}
