pub mod annotation;
pub mod curve;
pub mod demo;
pub mod hatch;
pub mod mesh;
pub mod primitive;
pub mod registry;
pub mod solid;
pub mod surface;
pub mod text;
pub mod units;

pub mod errors {
    use cadlink_core::drafting::DocumentError;
    use cadlink_core::nurbs::KnotError;
    use cadlink_io::IoError;
    use thiserror::Error;

    /// 转换错误。未支持的类型不是错误，以 `Ok(None)` / 空结果表示。
    #[derive(Debug, Error)]
    pub enum ConvertError {
        #[error("malformed {entity}: {reason}")]
        Malformed {
            entity: &'static str,
            reason: String,
        },
        #[error("unit system is unset and no fallback unit is configured")]
        UnsetUnits,
        #[error(transparent)]
        Knot(#[from] KnotError),
        #[error(transparent)]
        Document(#[from] DocumentError),
        #[error(transparent)]
        Io(#[from] IoError),
    }

    impl ConvertError {
        pub(crate) fn malformed(entity: &'static str, reason: impl Into<String>) -> Self {
            Self::Malformed {
                entity,
                reason: reason.into(),
            }
        }
    }
}

pub mod context {
    use std::sync::Arc;

    use crate::units::UnitScale;

    pub const DEFAULT_TOLERANCE: f64 = 1e-6;
    pub const DEFAULT_FONT: &str = "Arial";

    /// 单次转换所需的全部环境：单位比例快照、几何容差与默认字体。
    #[derive(Debug, Clone)]
    pub struct ConversionContext {
        pub units: Arc<UnitScale>,
        pub tolerance: f64,
        pub default_font: String,
    }

    impl ConversionContext {
        pub fn new(units: Arc<UnitScale>) -> Self {
            Self {
                units,
                tolerance: DEFAULT_TOLERANCE,
                default_font: DEFAULT_FONT.to_string(),
            }
        }

        pub fn with_tolerance(mut self, tolerance: f64) -> Self {
            self.tolerance = tolerance;
            self
        }

        pub fn with_default_font(mut self, font: impl Into<String>) -> Self {
            self.default_font = font.into();
            self
        }

        #[inline]
        pub fn to_target(&self, value: f64) -> f64 {
            self.units.to_target_length(value)
        }

        #[inline]
        pub fn to_source(&self, value: f64) -> f64 {
            self.units.to_source_length(value)
        }
    }

    impl Default for ConversionContext {
        fn default() -> Self {
            Self::new(Arc::new(UnitScale::identity()))
        }
    }
}

pub use context::ConversionContext;
pub use errors::ConvertError;
pub use registry::{BatchReport, ConverterRegistry};
pub use units::{UnitScale, UnitSystemManager};
