//! 三维实体转换。
//!
//! 两条路径互不混用：注册表使用的同步路径把实体炸开为独立面，得到 Brep 替身；
//! 文件往返路径经交换文件导出再导入，保留拓扑，得到真实 Brep。

use cadlink_core::{
    drafting::{Document, Entity, FaceSurface, Solid3d},
    freeform::{Brep, BrepProxy, Geometry, Model},
};
use cadlink_io::{
    BrepExporter, BrepImporter, ExchangeFacade, InterchangeKind, InterchangeWorkspace,
    SolidExporter, SolidImporter,
};
use tracing::{debug, info, warn};

use crate::context::ConversionContext;
use crate::errors::ConvertError;
use crate::surface::{planar_patch_to_target, surface_to_target};

/// 炸开为独立面后逐面转换；结果没有面间拓扑，永远不是闭合实体。
pub fn solid_to_proxy(solid: &Solid3d, ctx: &ConversionContext) -> Result<BrepProxy, ConvertError> {
    let mut faces = Vec::with_capacity(solid.face_count());
    for face in solid.explode() {
        let surface = match face {
            FaceSurface::Planar(patch) => planar_patch_to_target(patch, ctx),
            FaceSurface::Nurbs(surface) => surface_to_target(surface, ctx)?,
        };
        faces.push(surface);
    }
    debug!(faces = faces.len(), "实体已炸开为 Brep 替身");
    Ok(BrepProxy { faces })
}

/// 经交换文件的实体往返。
///
/// 交换文件写在固定名称的临时路径上，每次调用覆盖，不做清理；
/// 并发使用同一工作目录的调用方需自行串行化。
pub struct FileRoundTrip {
    workspace: InterchangeWorkspace,
    solid_exporter: Box<dyn SolidExporter>,
    brep_importer: Box<dyn BrepImporter>,
    brep_exporter: Box<dyn BrepExporter>,
    solid_importer: Box<dyn SolidImporter>,
}

impl FileRoundTrip {
    /// 使用内置交换格式。
    pub fn exchange(workspace: InterchangeWorkspace) -> Self {
        Self {
            workspace,
            solid_exporter: Box::new(ExchangeFacade::new()),
            brep_importer: Box::new(ExchangeFacade::new()),
            brep_exporter: Box::new(ExchangeFacade::new()),
            solid_importer: Box::new(ExchangeFacade::new()),
        }
    }

    pub fn with_solid_exporter(mut self, exporter: impl SolidExporter + 'static) -> Self {
        self.solid_exporter = Box::new(exporter);
        self
    }

    pub fn with_brep_importer(mut self, importer: impl BrepImporter + 'static) -> Self {
        self.brep_importer = Box::new(importer);
        self
    }

    pub fn with_brep_exporter(mut self, exporter: impl BrepExporter + 'static) -> Self {
        self.brep_exporter = Box::new(exporter);
        self
    }

    pub fn with_solid_importer(mut self, importer: impl SolidImporter + 'static) -> Self {
        self.solid_importer = Box::new(importer);
        self
    }

    /// 实体导出后导入无界面模型，收集其中的 Brep。
    /// 任一步失败只记录警告并返回空列表。
    pub fn solids_to_breps(&self, solids: &[&Solid3d], ctx: &ConversionContext) -> Vec<Brep> {
        match self.try_solids_to_breps(solids, ctx) {
            Ok(breps) => {
                if breps.is_empty() {
                    warn!(solids = solids.len(), "交换文件导入后没有得到任何 Brep");
                } else {
                    info!(solids = solids.len(), breps = breps.len(), "实体文件往返完成");
                }
                breps
            }
            Err(err) => {
                warn!(error = %err, "实体文件往返失败");
                Vec::new()
            }
        }
    }

    fn try_solids_to_breps(
        &self,
        solids: &[&Solid3d],
        ctx: &ConversionContext,
    ) -> Result<Vec<Brep>, ConvertError> {
        let path = self.workspace.prepare(InterchangeKind::SolidExport)?;
        self.solid_exporter
            .export_solids(solids, ctx.units.source(), &path)?;

        let mut model = Model::new(ctx.units.target());
        let imported = self.brep_importer.import_breps(&path, &mut model)?;
        debug!(path = %path.display(), imported, "交换文件已导入模型");

        Ok(model
            .into_objects()
            .into_iter()
            .filter_map(|object| match object {
                Geometry::Brep(brep) => Some(brep),
                _ => None,
            })
            .collect())
    }

    /// Brep 导出后在临时文档的事务内导入，再取出生成的实体。
    /// 任一步失败只记录警告并返回空列表。
    pub fn breps_to_solids(&self, breps: &[&Brep], ctx: &ConversionContext) -> Vec<Solid3d> {
        match self.try_breps_to_solids(breps, ctx) {
            Ok(solids) => {
                if solids.is_empty() {
                    warn!(breps = breps.len(), "交换文件导入后没有得到任何实体");
                } else {
                    info!(breps = breps.len(), solids = solids.len(), "Brep 文件往返完成");
                }
                solids
            }
            Err(err) => {
                warn!(error = %err, "Brep 文件往返失败");
                Vec::new()
            }
        }
    }

    fn try_breps_to_solids(
        &self,
        breps: &[&Brep],
        ctx: &ConversionContext,
    ) -> Result<Vec<Solid3d>, ConvertError> {
        let path = self.workspace.prepare(InterchangeKind::BrepExport)?;
        self.brep_exporter
            .export_breps(breps, ctx.units.target(), &path)?;

        let mut document = Document::with_units(ctx.units.source());
        let ids = {
            let mut lock = document.lock();
            let mut transaction = lock.start_transaction();
            self.solid_importer
                .import_solids(&path, ctx.units.source(), &mut transaction)?;
            transaction.commit()
        };

        Ok(ids
            .into_iter()
            .filter_map(|id| match document.erase(id) {
                Some(Entity::Solid3d(solid)) => Some(solid),
                _ => None,
            })
            .collect())
    }
}
