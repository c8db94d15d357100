use std::fs;
use std::path::Path;

use assert_cmd::Command;
use cadlink_core::{
    drafting::{Document, Entity, FaceSurface, Line, PlanarPatch, Solid3d, SolidLump},
    freeform::{Curve, Geometry, Model},
    geometry::{Point3, Vector3},
    units::LengthUnit,
};
use predicates::prelude::*;
use tempfile::TempDir;

fn cli() -> Command {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_cadlink"));
    cmd.env_remove("CADLINK_CONFIG");
    cmd
}

fn write_document(dir: &Path, document: &Document) -> std::path::PathBuf {
    let path = dir.join("document.json");
    let text = serde_json::to_string(document).expect("序列化文档失败");
    fs::write(&path, text).expect("写入文档失败");
    path
}

fn line_document() -> Document {
    let mut document = Document::with_units(LengthUnit::Inches);
    document.add_entity(Entity::Line(Line {
        start: Point3::new(0.0, 0.0, 0.0),
        end: Point3::new(10.0, 0.0, 0.0),
    }));
    document.add_entity(Entity::Unsupported {
        type_name: "AcDbOle2Frame".to_string(),
    });
    document
}

#[test]
fn units_command_converts_lengths() {
    cli()
        .args(["units", "1", "--from", "in", "--to", "mm"])
        .assert()
        .success()
        .stdout(predicate::str::contains("25.4 mm"));
}

#[test]
fn unknown_unit_is_rejected() {
    cli()
        .args(["units", "1", "--from", "parsec", "--to", "mm"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("parsec"));
}

#[test]
fn demo_reports_every_entity_converted() {
    cli()
        .args(["demo", "--to", "m"])
        .assert()
        .success()
        .stdout(predicate::str::contains("mm -> m"))
        .stdout(predicate::str::contains("brep_proxy"))
        .stdout(predicate::str::contains("失败 0"));
}

#[test]
fn convert_scales_document_and_skips_unsupported() {
    let dir = TempDir::new().expect("创建临时目录失败");
    let input = write_document(dir.path(), &line_document());
    let output = dir.path().join("model.json");

    cli()
        .arg("convert")
        .arg(&input)
        .args(["--to", "mm", "-o"])
        .arg(&output)
        .assert()
        .success()
        .stderr(predicate::str::contains("跳过 1"));

    let model: Model =
        serde_json::from_str(&fs::read_to_string(&output).expect("读取结果失败")).expect("解析模型失败");
    assert_eq!(model.units(), LengthUnit::Millimeters);
    assert_eq!(model.objects().len(), 1);
    let Geometry::Curve(Curve::Line(line)) = &model.objects()[0] else {
        panic!("应得到直线: {:?}", model.objects()[0]);
    };
    assert!((line.end.x() - 254.0).abs() < 1e-9);

    let back = dir.path().join("back.json");
    cli()
        .arg("convert")
        .arg(&output)
        .args(["--reverse", "--to", "in", "-o"])
        .arg(&back)
        .assert()
        .success();
    let document: Document =
        serde_json::from_str(&fs::read_to_string(&back).expect("读取结果失败")).expect("解析文档失败");
    assert_eq!(document.units(), LengthUnit::Inches);
    let Some((_, Entity::Line(line))) = document.entities().next() else {
        panic!("应得到直线");
    };
    assert!((line.end.x() - 10.0).abs() < 1e-9);
}

#[test]
fn solids_go_through_the_exchange_file_on_request() {
    let dir = TempDir::new().expect("创建临时目录失败");
    let exchange_root = dir.path().join("exchange");
    let config = dir.path().join("cadlink.toml");
    fs::write(
        &config,
        format!(
            "[interchange]\nroot = '{}'\n",
            exchange_root.display()
        ),
    )
    .expect("写入配置失败");

    let mut document = Document::with_units(LengthUnit::Millimeters);
    document.add_entity(Entity::Solid3d(Solid3d {
        lumps: vec![SolidLump {
            faces: vec![FaceSurface::Planar(PlanarPatch {
                origin: Point3::ORIGIN,
                u_edge: Vector3::new(5.0, 0.0, 0.0),
                v_edge: Vector3::new(0.0, 5.0, 0.0),
            })],
            shared_edges: Vec::new(),
        }],
    }));
    let input = write_document(dir.path(), &document);

    let assert = cli()
        .arg("--config")
        .arg(&config)
        .arg("convert")
        .arg(&input)
        .args(["--to", "mm", "--via-exchange"])
        .assert()
        .success();
    let model: Model =
        serde_json::from_slice(&assert.get_output().stdout).expect("标准输出应为模型 JSON");
    assert_eq!(model.objects().len(), 1);
    assert!(matches!(model.objects()[0], Geometry::Brep(_)));
    assert!(exchange_root.join("solid_export.json").exists());
}

#[test]
fn missing_input_fails_with_message() {
    let dir = TempDir::new().expect("创建临时目录失败");
    cli()
        .arg("convert")
        .arg(dir.path().join("absent.json"))
        .assert()
        .failure()
        .stderr(predicate::str::contains("absent.json"));
}
