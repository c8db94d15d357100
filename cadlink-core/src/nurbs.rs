//! NURBS 基础运算。
//!
//! 两个系统的节点向量约定不同：
//! - *完整* 约定（绘图端、交换文件）：`degree + N + 1` 个节点；
//! - *紧凑* 约定（自由曲面端）：去掉两端冗余节点，共 `degree + N - 1` 个节点。
//!
//! 本模块内部统一使用完整约定与齐次控制点 `(wx, wy, wz, w)`。

use std::f64::consts::FRAC_PI_2;

use glam::{DVec3, DVec4};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// 节点值判等的绝对容差：差值 `<=` 该值视为同一节点。
pub const KNOT_TOLERANCE: f64 = 1e-9;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum KnotError {
    #[error("degree must be at least 1")]
    InvalidDegree,
    #[error("{count} control points cannot carry a degree {degree} curve")]
    TooFewPoints { degree: usize, count: usize },
    #[error("knot vector must be non-decreasing")]
    Decreasing,
    #[error("expected {expected} knots, got {actual}")]
    Count { expected: usize, actual: usize },
    #[error("{points} control points but {weights} weights")]
    WeightCount { points: usize, weights: usize },
    #[error("parameter {0} lies outside the curve domain")]
    OutOfDomain(f64),
    #[error("curves are not contiguous (gap {gap})")]
    Gap { gap: f64 },
    #[error("no curves to join")]
    Empty,
}

#[inline]
pub fn same_knot(a: f64, b: f64) -> bool {
    (a - b).abs() <= KNOT_TOLERANCE
}

/// 将节点向量折叠为 `(值, 重复度)` 序列，每段以首个值为准比较。
pub fn multiplicities(knots: &[f64]) -> Vec<(f64, usize)> {
    let mut runs: Vec<(f64, usize)> = Vec::new();
    for &knot in knots {
        match runs.last_mut() {
            Some((value, count)) if same_knot(*value, knot) => *count += 1,
            _ => runs.push((knot, 1)),
        }
    }
    runs
}

fn leading_multiplicity(knots: &[f64]) -> usize {
    multiplicities(knots).first().map_or(0, |(_, count)| *count)
}

fn trailing_multiplicity(knots: &[f64]) -> usize {
    multiplicities(knots).last().map_or(0, |(_, count)| *count)
}

fn validate(knots: &[f64], degree: usize, count: usize) -> Result<(), KnotError> {
    if degree == 0 {
        return Err(KnotError::InvalidDegree);
    }
    if count < degree + 1 {
        return Err(KnotError::TooFewPoints { degree, count });
    }
    if knots.windows(2).any(|pair| pair[1] < pair[0] - KNOT_TOLERANCE) {
        return Err(KnotError::Decreasing);
    }
    Ok(())
}

/// 完整约定 → 紧凑约定。
///
/// 逐个扫描节点，同一值最多保留 `degree` 次；若仍多出节点，则从两端剔除：
/// 多两个时两端各删一个，多一个时删除重复度较低的一端（相同则删起点）。
pub fn full_to_compact(knots: &[f64], degree: usize, count: usize) -> Result<Vec<f64>, KnotError> {
    validate(knots, degree, count)?;
    let mut capped: Vec<f64> = Vec::with_capacity(knots.len());
    let mut run: Option<(f64, usize)> = None;
    for &knot in knots {
        match run.as_mut() {
            Some((value, seen)) if same_knot(*value, knot) => {
                *seen += 1;
                if *seen > degree {
                    continue;
                }
            }
            _ => run = Some((knot, 1)),
        }
        capped.push(knot);
    }

    let expected = count + degree - 1;
    match capped.len().checked_sub(expected) {
        Some(0) => {}
        Some(1) => {
            if trailing_multiplicity(&capped) < leading_multiplicity(&capped) {
                capped.pop();
            } else {
                capped.remove(0);
            }
        }
        Some(2) => {
            capped.remove(0);
            capped.pop();
        }
        _ => {
            return Err(KnotError::Count {
                expected: count + degree + 1,
                actual: knots.len(),
            });
        }
    }
    Ok(capped)
}

/// 紧凑约定 → 完整约定：两端各补一个节点。
///
/// 端部重复度已达 `degree` 时复制端点节点，否则按相邻节点间距外推。
pub fn compact_to_full(knots: &[f64], degree: usize, count: usize) -> Result<Vec<f64>, KnotError> {
    validate(knots, degree, count)?;
    let expected = count + degree - 1;
    if knots.len() != expected {
        return Err(KnotError::Count {
            expected,
            actual: knots.len(),
        });
    }

    let runs = multiplicities(knots);
    let (first, first_mult) = runs[0];
    let (last, last_mult) = runs[runs.len() - 1];
    let head = if first_mult >= degree || runs.len() < 2 {
        knots[0]
    } else {
        knots[0] - (runs[1].0 - first)
    };
    let tail = if last_mult >= degree || runs.len() < 2 {
        knots[knots.len() - 1]
    } else {
        knots[knots.len() - 1] + (last - runs[runs.len() - 2].0)
    };

    let mut full = Vec::with_capacity(knots.len() + 2);
    full.push(head);
    full.extend_from_slice(knots);
    full.push(tail);
    Ok(full)
}

/// 齐次控制点 + 完整节点向量表示的 B 样条曲线。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BSplineCurve {
    pub degree: usize,
    pub points: Vec<DVec4>,
    pub knots: Vec<f64>,
}

impl BSplineCurve {
    pub fn new(degree: usize, points: Vec<DVec4>, knots: Vec<f64>) -> Result<Self, KnotError> {
        validate(&knots, degree, points.len())?;
        let expected = points.len() + degree + 1;
        if knots.len() != expected {
            return Err(KnotError::Count {
                expected,
                actual: knots.len(),
            });
        }
        Ok(Self {
            degree,
            points,
            knots,
        })
    }

    /// 由笛卡尔坐标与权重构造；权重缺失时按 1.0 处理。
    pub fn from_weighted(
        degree: usize,
        locations: &[DVec3],
        weights: &[f64],
        knots: Vec<f64>,
    ) -> Result<Self, KnotError> {
        if weights.len() > locations.len() {
            return Err(KnotError::WeightCount {
                points: locations.len(),
                weights: weights.len(),
            });
        }
        let points = locations
            .iter()
            .enumerate()
            .map(|(index, location)| {
                let w = weights.get(index).copied().unwrap_or(1.0);
                (*location * w).extend(w)
            })
            .collect();
        Self::new(degree, points, knots)
    }

    /// 直线段（一次、两控制点），参数域为 `[0, 长度]`。
    pub fn line(start: DVec3, end: DVec3) -> Self {
        let length = start.distance(end);
        let length = if length > 0.0 { length } else { 1.0 };
        Self {
            degree: 1,
            points: vec![start.extend(1.0), end.extend(1.0)],
            knots: vec![0.0, 0.0, length, length],
        }
    }

    /// 精确的有理二次椭圆弧：`center + cos(t)·x_axis + sin(t)·y_axis`，`t ∈ [t0, t1]`。
    ///
    /// 圆弧为 `x_axis`、`y_axis` 等长且正交的特例。参数域即角度区间。
    pub fn elliptical_arc(center: DVec3, x_axis: DVec3, y_axis: DVec3, t0: f64, t1: f64) -> Self {
        let sweep = (t1 - t0).abs().min(std::f64::consts::TAU);
        let arcs = ((sweep / FRAC_PI_2) - 1e-9).ceil().max(1.0) as usize;
        let step = sweep / arcs as f64;
        let weight = (step / 2.0).cos();
        let at = |angle: f64| center + x_axis * angle.cos() + y_axis * angle.sin();

        let mut points = Vec::with_capacity(2 * arcs + 1);
        let mut knots = vec![t0; 3];
        points.push(at(t0).extend(1.0));
        for i in 0..arcs {
            let a = t0 + step * i as f64;
            let mid = a + step / 2.0;
            let shoulder = center + (x_axis * mid.cos() + y_axis * mid.sin()) / weight;
            points.push((shoulder * weight).extend(weight));
            points.push(at(a + step).extend(1.0));
            if i + 1 < arcs {
                knots.push(a + step);
                knots.push(a + step);
            }
        }
        knots.extend([t0 + sweep; 3]);
        Self {
            degree: 2,
            points,
            knots,
        }
    }

    #[inline]
    pub fn location(&self, index: usize) -> DVec3 {
        let p = self.points[index];
        p.truncate() / p.w
    }

    #[inline]
    pub fn weight(&self, index: usize) -> f64 {
        self.points[index].w
    }

    pub fn locations(&self) -> Vec<DVec3> {
        (0..self.points.len()).map(|i| self.location(i)).collect()
    }

    pub fn weights(&self) -> Vec<f64> {
        self.points.iter().map(|p| p.w).collect()
    }

    pub fn is_rational(&self) -> bool {
        self.points.iter().any(|p| (p.w - 1.0).abs() > 1e-12)
    }

    #[inline]
    pub fn domain(&self) -> (f64, f64) {
        (self.knots[self.degree], self.knots[self.points.len()])
    }

    pub fn multiplicity_of(&self, u: f64) -> usize {
        self.knots.iter().filter(|k| same_knot(**k, u)).count()
    }

    fn snap(&self, u: f64) -> f64 {
        self.knots
            .iter()
            .copied()
            .find(|k| same_knot(*k, u))
            .unwrap_or(u)
    }

    fn find_span(&self, u: f64) -> usize {
        let p = self.degree;
        let n = self.points.len() - 1;
        let knots = &self.knots;
        if u >= knots[n + 1] {
            let mut span = n;
            while span > p && knots[span] >= knots[n + 1] {
                span -= 1;
            }
            return span;
        }
        if u <= knots[p] {
            let mut span = p;
            while span < n && knots[span + 1] <= knots[p] {
                span += 1;
            }
            return span;
        }
        let (mut low, mut high) = (p, n + 1);
        let mut mid = (low + high) / 2;
        while u < knots[mid] || u >= knots[mid + 1] {
            if u < knots[mid] {
                high = mid;
            } else {
                low = mid;
            }
            mid = (low + high) / 2;
        }
        mid
    }

    fn basis(&self, span: usize, u: f64) -> Vec<f64> {
        let p = self.degree;
        let knots = &self.knots;
        let mut values = vec![0.0; p + 1];
        let mut left = vec![0.0; p + 1];
        let mut right = vec![0.0; p + 1];
        values[0] = 1.0;
        for j in 1..=p {
            left[j] = u - knots[span + 1 - j];
            right[j] = knots[span + j] - u;
            let mut saved = 0.0;
            for r in 0..j {
                let denom = right[r + 1] + left[j - r];
                let temp = if denom.abs() > 0.0 { values[r] / denom } else { 0.0 };
                values[r] = saved + right[r + 1] * temp;
                saved = left[j - r] * temp;
            }
            values[j] = saved;
        }
        values
    }

    /// 按 de Boor 方式求值，参数会被夹到定义域内。
    pub fn point_at(&self, u: f64) -> DVec3 {
        let (a, b) = self.domain();
        let u = u.clamp(a, b);
        let span = self.find_span(u);
        let basis = self.basis(span, u);
        let mut sum = DVec4::ZERO;
        for (i, n) in basis.iter().enumerate() {
            sum += self.points[span - self.degree + i] * *n;
        }
        sum.truncate() / sum.w
    }

    #[inline]
    pub fn start_point(&self) -> DVec3 {
        self.point_at(self.domain().0)
    }

    #[inline]
    pub fn end_point(&self) -> DVec3 {
        self.point_at(self.domain().1)
    }

    /// Boehm 节点插入，最多插到重复度 `degree`。
    pub fn insert_knot(&self, u: f64, times: usize) -> Result<Self, KnotError> {
        let p = self.degree;
        let u = self.snap(u);
        if u < self.knots[0] || u > self.knots[self.knots.len() - 1] {
            return Err(KnotError::OutOfDomain(u));
        }
        let s = self.multiplicity_of(u);
        let r = times.min(p.saturating_sub(s));
        if r == 0 {
            return Ok(self.clone());
        }

        let knots = &self.knots;
        let pts = &self.points;
        let n = pts.len() - 1;
        let k = knots
            .iter()
            .rposition(|value| *value <= u)
            .ok_or(KnotError::OutOfDomain(u))?;
        if k < p {
            return Err(KnotError::OutOfDomain(u));
        }

        let mut q = vec![DVec4::ZERO; n + 1 + r];
        for i in 0..=(k - p) {
            q[i] = pts[i];
        }
        for i in (k - s)..=n {
            q[i + r] = pts[i];
        }
        let mut work: Vec<DVec4> = (0..=(p - s)).map(|i| pts[k - p + i]).collect();
        let mut l = 0;
        for j in 1..=r {
            l = k - p + j;
            for i in 0..=(p - j - s) {
                let alpha = (u - knots[l + i]) / (knots[i + k + 1] - knots[l + i]);
                work[i] = work[i + 1] * alpha + work[i] * (1.0 - alpha);
            }
            q[l] = work[0];
            q[k + r - j - s] = work[p - j - s];
        }
        for i in (l + 1)..(k - s) {
            q[i] = work[i - l];
        }

        let mut refined = Vec::with_capacity(knots.len() + r);
        refined.extend_from_slice(&knots[..=k]);
        refined.extend(std::iter::repeat_n(u, r));
        refined.extend_from_slice(&knots[k + 1..]);
        Ok(Self {
            degree: p,
            points: q,
            knots: refined,
        })
    }

    /// 在内部参数 `u` 处一分为二。
    pub fn split_at(&self, u: f64) -> Result<(Self, Self), KnotError> {
        let (a, b) = self.domain();
        if u <= a + KNOT_TOLERANCE || u >= b - KNOT_TOLERANCE {
            return Err(KnotError::OutOfDomain(u));
        }
        let p = self.degree;
        let u = self.snap(u);
        let refined = self.insert_knot(u, p)?;
        let first = refined
            .knots
            .iter()
            .position(|k| same_knot(*k, u))
            .ok_or(KnotError::OutOfDomain(u))?;

        let mut left_knots = refined.knots[..first + p].to_vec();
        left_knots.push(u);
        let left = Self {
            degree: p,
            points: refined.points[..first].to_vec(),
            knots: left_knots,
        };

        let mut right_knots = vec![u];
        right_knots.extend_from_slice(&refined.knots[first..]);
        let right = Self {
            degree: p,
            points: refined.points[first - 1..].to_vec(),
            knots: right_knots,
        };
        Ok((left, right))
    }

    /// 截取 `[t0, t1]` 子区间，超出定义域的部分被忽略。
    pub fn trim(&self, t0: f64, t1: f64) -> Result<Self, KnotError> {
        let (a, b) = self.domain();
        let start = t0.max(a);
        let end = t1.min(b);
        if end - start <= KNOT_TOLERANCE {
            return Err(KnotError::OutOfDomain(t0));
        }
        let mut curve = self.clone();
        if end < b - KNOT_TOLERANCE {
            curve = curve.split_at(end)?.0;
        }
        if start > a + KNOT_TOLERANCE {
            curve = curve.split_at(start)?.1;
        }
        Ok(curve)
    }

    /// 两端夹紧（端节点重复 `degree + 1` 次），曲线形状与定义域不变。
    pub fn clamped(&self) -> Result<Self, KnotError> {
        let p = self.degree;
        let (a, b) = self.domain();
        let mut curve = self.clone();

        if leading_multiplicity(&curve.knots) < p + 1 {
            let s = curve.multiplicity_of(a);
            curve = curve.insert_knot(a, p.saturating_sub(s))?;
            let first = curve
                .knots
                .iter()
                .position(|k| same_knot(*k, a))
                .ok_or(KnotError::OutOfDomain(a))?;
            let mut knots = vec![a];
            knots.extend_from_slice(&curve.knots[first..]);
            curve = Self {
                degree: p,
                points: curve.points[first - 1..].to_vec(),
                knots,
            };
        }

        if trailing_multiplicity(&curve.knots) < p + 1 {
            let s = curve.multiplicity_of(b);
            curve = curve.insert_knot(b, p.saturating_sub(s))?;
            let first = curve
                .knots
                .iter()
                .position(|k| same_knot(*k, b))
                .ok_or(KnotError::OutOfDomain(b))?;
            let mut knots = curve.knots[..first + p].to_vec();
            knots.push(b);
            curve = Self {
                degree: p,
                points: curve.points[..first].to_vec(),
                knots,
            };
        }
        Ok(curve)
    }

    /// 升阶到 `degree`：先分解为 Bezier 段逐段升阶，再以 C0 拼接。
    pub fn elevate_to(&self, degree: usize) -> Result<Self, KnotError> {
        let mut work = self.clamped()?;
        let p = work.degree;
        if degree <= p {
            return Ok(work);
        }
        let (a, b) = work.domain();
        let interior: Vec<(f64, usize)> = multiplicities(&work.knots)
            .into_iter()
            .filter(|(value, _)| *value > a + KNOT_TOLERANCE && *value < b - KNOT_TOLERANCE)
            .collect();
        for (value, mult) in &interior {
            if *mult < p {
                work = work.insert_knot(*value, p - mult)?;
            }
        }

        let segments = (work.points.len() - 1) / p;
        let mut points: Vec<DVec4> = Vec::new();
        for index in 0..segments {
            let mut bezier = work.points[index * p..=index * p + p].to_vec();
            for current in p..degree {
                bezier = elevate_bezier(&bezier, current);
            }
            let skip = if index == 0 { 0 } else { 1 };
            points.extend_from_slice(&bezier[skip..]);
        }

        let mut knots = vec![a; degree + 1];
        for (value, _) in &interior {
            knots.extend(std::iter::repeat_n(*value, degree));
        }
        knots.extend(std::iter::repeat_n(b, degree + 1));
        Self::new(degree, points, knots)
    }

    /// 首尾相接的曲线合并为一条：统一升阶、参数域顺延、连接处 C0。
    pub fn join(curves: &[BSplineCurve], tolerance: f64) -> Result<Self, KnotError> {
        let degree = curves
            .iter()
            .map(|c| c.degree)
            .max()
            .ok_or(KnotError::Empty)?;
        let mut parts = curves.iter().map(|c| c.elevate_to(degree));
        let mut joined = parts.next().ok_or(KnotError::Empty)??;

        for part in parts {
            let next = part?;
            let tail = joined.points[joined.points.len() - 1];
            let gap = joined
                .location(joined.points.len() - 1)
                .distance(next.location(0));
            if gap > tolerance {
                return Err(KnotError::Gap { gap });
            }
            let scale = tail.w / next.points[0].w;
            let shift = joined.domain().1 - next.domain().0;
            joined.points.extend(next.points[1..].iter().map(|p| *p * scale));
            joined.knots.pop();
            joined
                .knots
                .extend(next.knots[degree + 1..].iter().map(|k| k + shift));
        }
        Ok(joined)
    }
}

/// Bezier 段由 `degree` 升至 `degree + 1`。
fn elevate_bezier(points: &[DVec4], degree: usize) -> Vec<DVec4> {
    let raised = degree + 1;
    let mut out = Vec::with_capacity(raised + 1);
    out.push(points[0]);
    for i in 1..raised {
        let alpha = i as f64 / raised as f64;
        out.push(points[i - 1] * alpha + points[i] * (1.0 - alpha));
    }
    out.push(points[degree]);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f64::consts::{FRAC_1_SQRT_2, PI, TAU};

    fn sample_cubic() -> BSplineCurve {
        let locations = [
            DVec3::new(0.0, 0.0, 0.0),
            DVec3::new(1.0, 2.0, 0.0),
            DVec3::new(3.0, 3.0, 1.0),
            DVec3::new(5.0, 1.0, 0.0),
            DVec3::new(6.0, -1.0, 2.0),
        ];
        BSplineCurve::from_weighted(
            3,
            &locations,
            &[1.0, 0.5, 2.0, 1.0, 1.0],
            vec![0.0, 0.0, 0.0, 0.0, 1.0, 2.0, 2.0, 2.0, 2.0],
        )
        .unwrap()
    }

    fn assert_close(a: DVec3, b: DVec3) {
        assert!((a - b).length() < 1e-9, "{a:?} != {b:?}");
    }

    #[test]
    fn clamped_full_vector_drops_one_end_knot_each_side() {
        let full = [0.0, 0.0, 0.0, 0.0, 1.0, 2.0, 2.0, 2.0, 2.0];
        let compact = full_to_compact(&full, 3, 5).unwrap();
        assert_eq!(compact, vec![0.0, 0.0, 0.0, 1.0, 2.0, 2.0, 2.0]);
        assert_eq!(compact_to_full(&compact, 3, 5).unwrap(), full.to_vec());
    }

    #[test]
    fn unclamped_vector_round_trips_with_same_pattern() {
        let full: Vec<f64> = (0..8).map(f64::from).collect();
        let compact = full_to_compact(&full, 3, 4).unwrap();
        assert_eq!(compact, vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0]);
        assert_eq!(compact_to_full(&compact, 3, 4).unwrap(), full);
    }

    #[test]
    fn degree_one_unclamped_vector_comes_back_clamped() {
        // 一次样条的每个节点重复度都已达次数，补回时只能复制端点
        let full = [0.0, 0.5, 1.0, 1.5];
        let compact = full_to_compact(&full, 1, 2).unwrap();
        assert_eq!(compact, vec![0.5, 1.0]);
        let back = compact_to_full(&compact, 1, 2).unwrap();
        assert_eq!(back, vec![0.5, 0.5, 1.0, 1.0]);
        assert_eq!(back.len(), full.len());
    }

    #[test]
    fn one_sided_clamp_trims_the_free_end() {
        let full = [0.0, 0.0, 0.0, 0.0, 1.0, 2.0, 3.0, 4.0, 5.0];
        let compact = full_to_compact(&full, 3, 5).unwrap();
        assert_eq!(compact, vec![0.0, 0.0, 0.0, 1.0, 2.0, 3.0, 4.0]);
        let back = compact_to_full(&compact, 3, 5).unwrap();
        assert_eq!(back, full.to_vec());
    }

    #[test]
    fn interior_multiplicity_is_capped_at_degree() {
        let full = [0.0, 0.0, 0.0, 1.0, 1.0, 2.0, 2.0, 2.0];
        let compact = full_to_compact(&full, 2, 5).unwrap();
        assert_eq!(compact, vec![0.0, 0.0, 1.0, 1.0, 2.0, 2.0]);
    }

    #[test]
    fn tolerance_boundary_decides_knot_identity() {
        let half = KNOT_TOLERANCE * 0.5;
        let full = [0.0, 0.0, half, 1.0, 1.0, 1.0];
        let compact = full_to_compact(&full, 2, 3).unwrap();
        assert_eq!(compact.len(), 4);
        assert_eq!(multiplicities(&compact)[0].1, 2);

        let apart = KNOT_TOLERANCE * 3.0;
        let full = [0.0, 0.0, apart, 1.0, 1.0, 1.0];
        let runs = multiplicities(&full);
        assert_eq!(runs[0].1, 2);
        assert_eq!(runs[1].1, 1);
    }

    #[test]
    fn wrong_knot_counts_are_rejected() {
        assert!(matches!(
            full_to_compact(&[0.0, 0.0, 1.0, 1.0], 3, 5),
            Err(KnotError::Count { .. })
        ));
        assert!(matches!(
            compact_to_full(&[0.0, 1.0], 2, 3),
            Err(KnotError::Count { .. })
        ));
        assert_eq!(
            full_to_compact(&[0.0, 2.0, 1.0, 3.0], 1, 2),
            Err(KnotError::Decreasing)
        );
    }

    #[test]
    fn circle_arc_points_lie_on_circle() {
        let arc = BSplineCurve::elliptical_arc(DVec3::ZERO, DVec3::X * 2.0, DVec3::Y * 2.0, 0.0, TAU);
        assert_eq!(arc.points.len(), 9);
        assert!((arc.weight(1) - FRAC_1_SQRT_2).abs() < 1e-12);
        for i in 0..=40 {
            let t = TAU * i as f64 / 40.0;
            assert!((arc.point_at(t).length() - 2.0).abs() < 1e-9);
        }
        assert_close(arc.point_at(PI / 2.0), DVec3::new(0.0, 2.0, 0.0));
    }

    #[test]
    fn knot_insertion_keeps_shape() {
        let curve = sample_cubic();
        let refined = curve.insert_knot(0.5, 2).unwrap();
        assert_eq!(refined.points.len(), curve.points.len() + 2);
        for i in 0..=20 {
            let t = 2.0 * i as f64 / 20.0;
            assert_close(curve.point_at(t), refined.point_at(t));
        }
    }

    #[test]
    fn trim_keeps_parameterization() {
        let curve = sample_cubic();
        let trimmed = curve.trim(0.25, 1.5).unwrap();
        assert_eq!(trimmed.domain(), (0.25, 1.5));
        for i in 0..=10 {
            let t = 0.25 + 1.25 * i as f64 / 10.0;
            assert_close(curve.point_at(t), trimmed.point_at(t));
        }
        assert!(curve.trim(1.0, 1.0).is_err());
    }

    #[test]
    fn unclamped_curve_can_be_clamped() {
        let locations: Vec<DVec3> = (0..5)
            .map(|i| DVec3::new(i as f64, (i % 2) as f64, 0.0))
            .collect();
        let knots: Vec<f64> = (0..8).map(f64::from).collect();
        let curve = BSplineCurve::from_weighted(2, &locations, &[], knots).unwrap();
        let clamped = curve.clamped().unwrap();
        assert_eq!(clamped.domain(), curve.domain());
        assert_eq!(leading_multiplicity(&clamped.knots), 3);
        assert_eq!(trailing_multiplicity(&clamped.knots), 3);
        for i in 0..=10 {
            let t = 2.0 + 3.0 * i as f64 / 10.0;
            assert_close(curve.point_at(t), clamped.point_at(t));
        }
    }

    #[test]
    fn elevation_preserves_rational_arc() {
        let arc = BSplineCurve::elliptical_arc(DVec3::ZERO, DVec3::X, DVec3::Y, 0.0, PI);
        let cubic = arc.elevate_to(3).unwrap();
        assert_eq!(cubic.degree, 3);
        for i in 0..=12 {
            let t = PI * i as f64 / 12.0;
            assert_close(arc.point_at(t), cubic.point_at(t));
        }
    }

    #[test]
    fn join_concatenates_line_and_arc() {
        let line = BSplineCurve::line(DVec3::new(-1.0, 0.0, 0.0), DVec3::new(1.0, 0.0, 0.0));
        let arc = BSplineCurve::elliptical_arc(DVec3::ZERO, DVec3::X, DVec3::Y, 0.0, PI);
        let joined = BSplineCurve::join(&[line, arc.clone()], 1e-9).unwrap();
        assert_eq!(joined.degree, 2);
        assert_close(joined.start_point(), DVec3::new(-1.0, 0.0, 0.0));
        assert_close(joined.end_point(), DVec3::new(-1.0, 0.0, 0.0));
        assert_close(joined.point_at(2.0 + PI / 2.0), arc.point_at(PI / 2.0));
        assert_eq!(joined.knots.len(), joined.points.len() + 3);
    }

    #[test]
    fn join_rejects_gaps() {
        let a = BSplineCurve::line(DVec3::ZERO, DVec3::X);
        let b = BSplineCurve::line(DVec3::new(2.0, 0.0, 0.0), DVec3::new(3.0, 0.0, 0.0));
        assert!(matches!(
            BSplineCurve::join(&[a, b], 1e-6),
            Err(KnotError::Gap { .. })
        ));
        assert_eq!(BSplineCurve::join(&[], 1e-6), Err(KnotError::Empty));
    }
}
