//! 单位系统管理：两端长度单位之间的比例。

use std::sync::{Arc, PoisonError, RwLock};

use cadlink_core::units::LengthUnit;
use tracing::debug;

use crate::errors::ConvertError;

/// 源端到目标端的长度比例，构造后不可变。
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct UnitScale {
    source: LengthUnit,
    target: LengthUnit,
    factor: f64,
}

impl UnitScale {
    pub fn identity() -> Self {
        Self {
            source: LengthUnit::Meters,
            target: LengthUnit::Meters,
            factor: 1.0,
        }
    }

    /// 未设置单位的一侧使用 `fallback`；`fallback` 也未设置时报错。
    pub fn resolve(
        source: LengthUnit,
        target: LengthUnit,
        fallback: LengthUnit,
    ) -> Result<Self, ConvertError> {
        let pick = |unit: LengthUnit| if unit.is_set() { unit } else { fallback };
        let source = pick(source);
        let target = pick(target);
        let factor = source
            .ratio_to(target)
            .filter(|factor| factor.is_finite() && *factor > 0.0)
            .ok_or(ConvertError::UnsetUnits)?;
        Ok(Self {
            source,
            target,
            factor,
        })
    }

    #[inline]
    pub fn source(&self) -> LengthUnit {
        self.source
    }

    #[inline]
    pub fn target(&self) -> LengthUnit {
        self.target
    }

    #[inline]
    pub fn factor(&self) -> f64 {
        self.factor
    }

    #[inline]
    pub fn to_target_length(&self, value: f64) -> f64 {
        value * self.factor
    }

    #[inline]
    pub fn to_source_length(&self, value: f64) -> f64 {
        value / self.factor
    }
}

/// 持有当前单位比例。单位变化时整体替换，读者只会看到完整的旧值或新值。
#[derive(Debug)]
pub struct UnitSystemManager {
    fallback: LengthUnit,
    current: RwLock<Arc<UnitScale>>,
}

impl UnitSystemManager {
    pub fn new(
        source: LengthUnit,
        target: LengthUnit,
        fallback: LengthUnit,
    ) -> Result<Self, ConvertError> {
        let scale = UnitScale::resolve(source, target, fallback)?;
        Ok(Self {
            fallback,
            current: RwLock::new(Arc::new(scale)),
        })
    }

    pub fn snapshot(&self) -> Arc<UnitScale> {
        let guard = self.current.read().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(&guard)
    }

    /// 任一文档单位变化后由外部调用；失败时保留旧比例。
    pub fn units_changed(
        &self,
        source: LengthUnit,
        target: LengthUnit,
    ) -> Result<Arc<UnitScale>, ConvertError> {
        let scale = Arc::new(UnitScale::resolve(source, target, self.fallback)?);
        let mut guard = self.current.write().unwrap_or_else(PoisonError::into_inner);
        *guard = Arc::clone(&scale);
        debug!(
            source = scale.source().abbreviation(),
            target = scale.target().abbreviation(),
            factor = scale.factor(),
            "单位比例已更新"
        );
        Ok(scale)
    }
}
