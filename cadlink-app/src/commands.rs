use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use cadlink_config::AppConfig;
use cadlink_core::{
    drafting::{Document, Entity, Solid3d},
    freeform::{Brep, Geometry, Model},
    units::LengthUnit,
};
use cadlink_engine::{
    BatchReport, ConversionContext, ConverterRegistry, UnitScale, UnitSystemManager,
    demo::populate_demo, solid::FileRoundTrip,
};
use cadlink_io::InterchangeWorkspace;
use tracing::{debug, info, warn};

#[derive(Debug)]
pub struct ConvertOptions {
    pub to: Option<LengthUnit>,
    pub via_exchange: bool,
    pub output: Option<PathBuf>,
}

fn prefer(primary: LengthUnit, secondary: LengthUnit) -> LengthUnit {
    if primary.is_set() { primary } else { secondary }
}

/// 每条命令各建一个单位管理器，上下文持有它的比例快照。
fn context(config: &AppConfig, source: LengthUnit, target: LengthUnit) -> Result<ConversionContext> {
    let manager = UnitSystemManager::new(source, target, config.units.fallback)
        .context("无法确定两端单位比例，请在配置的 [units] 中设置 fallback")?;
    let scale = manager.snapshot();
    debug!(
        source = scale.source().abbreviation(),
        target = scale.target().abbreviation(),
        factor = scale.factor(),
        "已确定单位比例"
    );
    Ok(ConversionContext::new(scale)
        .with_tolerance(config.conversion.geometry_tolerance)
        .with_default_font(config.conversion.default_font.clone()))
}

fn round_trip(config: &AppConfig) -> FileRoundTrip {
    FileRoundTrip::exchange(InterchangeWorkspace::new(
        config.interchange.resolved_root(),
    ))
}

fn summary<T>(report: &BatchReport<T>) -> String {
    format!(
        "转换 {} 个对象，跳过 {}，失败 {}",
        report.converted.len(),
        report.skipped.len(),
        report.failed.len()
    )
}

fn print_problems<T>(report: &BatchReport<T>) {
    for item in &report.skipped {
        eprintln!("  跳过 #{} {}", item.index, item.type_name);
    }
    for item in &report.failed {
        eprintln!("  失败 #{} {}: {}", item.index, item.type_name, item.error);
    }
}

fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("读取 {} 失败", path.display()))?;
    serde_json::from_str(&content).with_context(|| format!("解析 {} 失败", path.display()))
}

fn write_json<T: serde::Serialize>(value: &T, output: Option<&Path>) -> Result<()> {
    let text = serde_json::to_string_pretty(value).context("序列化结果失败")?;
    match output {
        Some(path) => {
            fs::write(path, text).with_context(|| format!("写入 {} 失败", path.display()))?;
            info!(path = %path.display(), "结果已写入");
        }
        None => println!("{text}"),
    }
    Ok(())
}

/// 长度保留九位小数并去掉末尾的零。
fn format_length(value: f64) -> String {
    let text = format!("{value:.9}");
    let text = text.trim_end_matches('0').trim_end_matches('.');
    if text == "-0" { "0".to_string() } else { text.to_string() }
}

pub fn convert_units(value: f64, from: LengthUnit, to: LengthUnit) -> Result<()> {
    let scale = UnitScale::resolve(from, to, LengthUnit::Unset).context("单位未设置")?;
    println!(
        "{} {}",
        format_length(scale.to_target_length(value)),
        scale.target().abbreviation()
    );
    Ok(())
}

pub fn run_demo(config: &AppConfig, to: Option<LengthUnit>, output: Option<&Path>) -> Result<()> {
    let source = prefer(config.units.source, LengthUnit::Millimeters);
    let mut document = Document::with_units(source);
    let ids = populate_demo(&mut document);
    info!(entities = document.len(), label = ids.label.get(), "演示文档已就绪");

    let ctx = context(config, source, to.unwrap_or(config.units.target))?;
    let registry = ConverterRegistry::with_defaults();
    let report =
        registry.convert_batch_to_target(document.entities().map(|(_, entity)| entity), &ctx);

    println!(
        "{} -> {}，比例 {}",
        ctx.units.source().abbreviation(),
        ctx.units.target().abbreviation(),
        format_length(ctx.units.factor())
    );
    let mut counts: BTreeMap<&'static str, usize> = BTreeMap::new();
    for geometry in &report.converted {
        *counts.entry(geometry.type_tag()).or_default() += 1;
    }
    for (tag, count) in &counts {
        println!("  {tag:<16}{count}");
    }
    println!("{}", summary(&report));
    print_problems(&report);

    if let Some(path) = output {
        let mut model = Model::new(ctx.units.target());
        for geometry in report.converted {
            model.add(geometry);
        }
        write_json(&model, Some(path))?;
    }
    Ok(())
}

/// 绘图文档 JSON 转为自由曲面端模型 JSON。
pub fn convert_document(config: &AppConfig, input: &Path, options: &ConvertOptions) -> Result<()> {
    let document: Document = read_json(input)?;
    let source = prefer(document.units(), config.units.source);
    let ctx = context(config, source, options.to.unwrap_or(config.units.target))?;

    let (solids, others): (Vec<&Entity>, Vec<&Entity>) = document
        .entities()
        .map(|(_, entity)| entity)
        .partition(|entity| options.via_exchange && matches!(entity, Entity::Solid3d(_)));

    let registry = ConverterRegistry::with_defaults();
    let report = registry.convert_batch_to_target(others, &ctx);
    eprintln!("{}", summary(&report));
    print_problems(&report);

    let mut model = Model::new(ctx.units.target());
    for geometry in report.converted {
        model.add(geometry);
    }

    let solids: Vec<&Solid3d> = solids
        .into_iter()
        .filter_map(|entity| match entity {
            Entity::Solid3d(solid) => Some(solid),
            _ => None,
        })
        .collect();
    if !solids.is_empty() {
        let breps = round_trip(config).solids_to_breps(&solids, &ctx);
        if breps.is_empty() {
            warn!(solids = solids.len(), "实体未能经交换文件转换");
        }
        eprintln!("交换文件往返：{} 个实体 -> {} 个 Brep", solids.len(), breps.len());
        for brep in breps {
            model.add(Geometry::Brep(brep));
        }
    }

    write_json(&model, options.output.as_deref())
}

/// 自由曲面端模型 JSON 转回绘图文档 JSON。
pub fn convert_model(config: &AppConfig, input: &Path, options: &ConvertOptions) -> Result<()> {
    let model: Model = read_json(input)?;
    let source = options.to.unwrap_or(config.units.source);
    let ctx = context(config, source, model.units())?;

    let (breps, others): (Vec<&Geometry>, Vec<&Geometry>) = model
        .objects()
        .iter()
        .partition(|geometry| options.via_exchange && matches!(geometry, Geometry::Brep(_)));

    let registry = ConverterRegistry::with_defaults();
    let report = registry.convert_batch_to_source(others, &ctx);
    eprintln!("{}", summary(&report));
    print_problems(&report);

    let mut document = Document::with_units(ctx.units.source());
    for entity in report.converted {
        document.add_entity(entity);
    }

    let breps: Vec<&Brep> = breps
        .into_iter()
        .filter_map(|geometry| match geometry {
            Geometry::Brep(brep) => Some(brep),
            _ => None,
        })
        .collect();
    if !breps.is_empty() {
        let solids = round_trip(config).breps_to_solids(&breps, &ctx);
        eprintln!("交换文件往返：{} 个 Brep -> {} 个实体", breps.len(), solids.len());
        for solid in solids {
            document.add_entity(Entity::Solid3d(solid));
        }
    }

    write_json(&document, options.output.as_deref())
}
