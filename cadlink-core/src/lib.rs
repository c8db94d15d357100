pub mod drafting;
pub mod freeform;
pub mod nurbs;

pub mod geometry {
    use glam::{DVec2, DVec3};
    use serde::{Deserialize, Serialize};

    /// 二维点，内部以 `glam::DVec2` 表示，主要用于 OCS 平面内坐标。
    #[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
    pub struct Point2(pub DVec2);

    impl Point2 {
        #[inline]
        pub fn new(x: f64, y: f64) -> Self {
            Self(DVec2::new(x, y))
        }

        #[inline]
        pub fn x(self) -> f64 {
            self.0.x
        }

        #[inline]
        pub fn y(self) -> f64 {
            self.0.y
        }

        #[inline]
        pub fn vector_to(self, other: Point2) -> Vector2 {
            Vector2(other.0 - self.0)
        }
    }

    #[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
    pub struct Vector2(pub DVec2);

    impl Vector2 {
        #[inline]
        pub fn length(self) -> f64 {
            self.0.length()
        }
    }

    /// 三维点。
    #[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
    pub struct Point3(pub DVec3);

    impl Point3 {
        pub const ORIGIN: Point3 = Point3(DVec3::ZERO);

        #[inline]
        pub fn new(x: f64, y: f64, z: f64) -> Self {
            Self(DVec3::new(x, y, z))
        }

        #[inline]
        pub fn x(self) -> f64 {
            self.0.x
        }

        #[inline]
        pub fn y(self) -> f64 {
            self.0.y
        }

        #[inline]
        pub fn z(self) -> f64 {
            self.0.z
        }

        #[inline]
        pub fn vector_to(self, other: Point3) -> Vector3 {
            Vector3(other.0 - self.0)
        }

        #[inline]
        pub fn distance_to(self, other: Point3) -> f64 {
            self.0.distance(other.0)
        }

        #[inline]
        pub fn midpoint(self, other: Point3) -> Self {
            Self((self.0 + other.0) * 0.5)
        }
    }

    /// 三维向量，既可表示位移（随单位缩放），也可表示方向（不缩放）。
    #[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
    pub struct Vector3(pub DVec3);

    impl Vector3 {
        pub const X: Vector3 = Vector3(DVec3::X);
        pub const Y: Vector3 = Vector3(DVec3::Y);
        pub const Z: Vector3 = Vector3(DVec3::Z);

        #[inline]
        pub fn new(x: f64, y: f64, z: f64) -> Self {
            Self(DVec3::new(x, y, z))
        }

        #[inline]
        pub fn as_vec3(self) -> DVec3 {
            self.0
        }

        #[inline]
        pub fn length(self) -> f64 {
            self.0.length()
        }

        #[inline]
        pub fn length_squared(self) -> f64 {
            self.0.length_squared()
        }

        #[inline]
        pub fn normalize(self) -> Option<Self> {
            let len = self.0.length();
            if len <= f64::EPSILON || !len.is_finite() {
                None
            } else {
                Some(Self(self.0 / len))
            }
        }

        #[inline]
        pub fn dot(self, other: Vector3) -> f64 {
            self.0.dot(other.0)
        }

        #[inline]
        pub fn cross(self, other: Vector3) -> Vector3 {
            Vector3(self.0.cross(other.0))
        }

        /// 任意轴算法：由法向量推导 OCS 的 X 轴。
        pub fn arbitrary_x_axis(self) -> Option<Vector3> {
            const THRESHOLD: f64 = 1.0 / 64.0;
            let normal = self.normalize()?;
            let n = normal.0;
            let axis = if n.x.abs() < THRESHOLD && n.y.abs() < THRESHOLD {
                DVec3::Y.cross(n)
            } else {
                DVec3::Z.cross(n)
            };
            Vector3(axis).normalize()
        }
    }

    /// 参数区间，`start` 不要求小于 `end`。
    #[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
    pub struct Interval {
        pub start: f64,
        pub end: f64,
    }

    impl Interval {
        #[inline]
        pub fn new(start: f64, end: f64) -> Self {
            Self { start, end }
        }

        #[inline]
        pub fn length(&self) -> f64 {
            self.end - self.start
        }

        #[inline]
        pub fn is_increasing(&self) -> bool {
            self.end > self.start
        }
    }

    /// 右手正交坐标平面。
    #[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
    pub struct Plane {
        pub origin: Point3,
        pub x_axis: Vector3,
        pub y_axis: Vector3,
        pub z_axis: Vector3,
    }

    impl Plane {
        /// 由原点与法向量构造平面，X 轴遵循任意轴算法。
        pub fn from_normal(origin: Point3, normal: Vector3) -> Option<Self> {
            let z_axis = normal.normalize()?;
            let x_axis = z_axis.arbitrary_x_axis()?;
            Some(Self {
                origin,
                x_axis,
                y_axis: z_axis.cross(x_axis),
                z_axis,
            })
        }

        /// 由原点、近似 X 方向与法向量构造平面，X 方向会被正交化。
        pub fn from_x_axis(origin: Point3, x_direction: Vector3, normal: Vector3) -> Option<Self> {
            let z_axis = normal.normalize()?;
            let x = x_direction.0 - z_axis.0 * x_direction.dot(z_axis);
            let x_axis = Vector3(x).normalize()?;
            Some(Self {
                origin,
                x_axis,
                y_axis: z_axis.cross(x_axis),
                z_axis,
            })
        }

        #[inline]
        pub fn point_at(&self, u: f64, v: f64) -> Point3 {
            Point3(self.origin.0 + self.x_axis.0 * u + self.y_axis.0 * v)
        }

        #[inline]
        pub fn point_at_2d(&self, point: Point2) -> Point3 {
            self.point_at(point.x(), point.y())
        }

        /// 世界坐标点在平面内的局部坐标（忽略法向分量）。
        #[inline]
        pub fn project(&self, point: Point3) -> Point2 {
            let offset = point.0 - self.origin.0;
            Point2::new(offset.dot(self.x_axis.0), offset.dot(self.y_axis.0))
        }

        #[inline]
        pub fn distance_to(&self, point: Point3) -> f64 {
            (point.0 - self.origin.0).dot(self.z_axis.0)
        }

        /// 绕法向量旋转 X/Y 轴。
        pub fn rotated(&self, angle: f64) -> Self {
            let (sin, cos) = angle.sin_cos();
            let x = self.x_axis.0 * cos + self.y_axis.0 * sin;
            let y = self.y_axis.0 * cos - self.x_axis.0 * sin;
            Self {
                origin: self.origin,
                x_axis: Vector3(x),
                y_axis: Vector3(y),
                z_axis: self.z_axis,
            }
        }

        /// 保留 X 轴，翻转 Y 与法向量，用于把顺时针圆弧转为逆时针表示。
        pub fn flipped(&self) -> Self {
            Self {
                origin: self.origin,
                x_axis: self.x_axis,
                y_axis: Vector3(-self.y_axis.0),
                z_axis: Vector3(-self.z_axis.0),
            }
        }

        pub fn with_origin(&self, origin: Point3) -> Self {
            Self { origin, ..*self }
        }
    }

    #[cfg(test)]
    mod tests {
        use super::*;

        #[test]
        fn arbitrary_axis_for_world_z_is_world_x() {
            let axis = Vector3::Z.arbitrary_x_axis().unwrap();
            assert!((axis.0 - DVec3::X).length() < 1e-12);
            let plane = Plane::from_normal(Point3::ORIGIN, Vector3::Z).unwrap();
            assert!((plane.y_axis.0 - DVec3::Y).length() < 1e-12);
        }

        #[test]
        fn arbitrary_axis_for_tilted_normal_is_horizontal() {
            let axis = Vector3::new(1.0, 0.0, 1.0).arbitrary_x_axis().unwrap();
            assert!(axis.0.z.abs() < 1e-12);
            assert!((axis.length() - 1.0).abs() < 1e-12);
        }

        #[test]
        fn plane_projection_inverts_point_at() {
            let plane = Plane::from_x_axis(
                Point3::new(1.0, 2.0, 3.0),
                Vector3::new(1.0, 1.0, 0.0),
                Vector3::Z,
            )
            .unwrap();
            let world = plane.point_at(3.0, -2.0);
            let local = plane.project(world);
            assert!((local.x() - 3.0).abs() < 1e-12);
            assert!((local.y() + 2.0).abs() < 1e-12);
            assert!(plane.distance_to(world).abs() < 1e-12);
        }

        #[test]
        fn degenerate_normal_has_no_plane() {
            assert!(Plane::from_normal(Point3::ORIGIN, Vector3::new(0.0, 0.0, 0.0)).is_none());
        }
    }
}

pub mod units {
    use serde::{Deserialize, Serialize};

    /// 文档长度单位。`Unset` 表示宿主文档未设置单位。
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
    #[serde(rename_all = "lowercase")]
    pub enum LengthUnit {
        #[default]
        Unset,
        Microns,
        Millimeters,
        Centimeters,
        Decimeters,
        Meters,
        Kilometers,
        Inches,
        Feet,
        Yards,
        Miles,
    }

    impl LengthUnit {
        /// 每单位对应的米数，`Unset` 返回 `None`。
        pub fn meters_per_unit(self) -> Option<f64> {
            match self {
                LengthUnit::Unset => None,
                LengthUnit::Microns => Some(1.0e-6),
                LengthUnit::Millimeters => Some(0.001),
                LengthUnit::Centimeters => Some(0.01),
                LengthUnit::Decimeters => Some(0.1),
                LengthUnit::Meters => Some(1.0),
                LengthUnit::Kilometers => Some(1000.0),
                LengthUnit::Inches => Some(0.0254),
                LengthUnit::Feet => Some(0.3048),
                LengthUnit::Yards => Some(0.9144),
                LengthUnit::Miles => Some(1609.344),
            }
        }

        #[inline]
        pub fn is_set(self) -> bool {
            !matches!(self, LengthUnit::Unset)
        }

        pub fn abbreviation(self) -> &'static str {
            match self {
                LengthUnit::Unset => "?",
                LengthUnit::Microns => "um",
                LengthUnit::Millimeters => "mm",
                LengthUnit::Centimeters => "cm",
                LengthUnit::Decimeters => "dm",
                LengthUnit::Meters => "m",
                LengthUnit::Kilometers => "km",
                LengthUnit::Inches => "in",
                LengthUnit::Feet => "ft",
                LengthUnit::Yards => "yd",
                LengthUnit::Miles => "mi",
            }
        }

        /// 解析缩写或全名（不区分大小写）。
        pub fn parse(value: &str) -> Option<Self> {
            let lower = value.trim().to_ascii_lowercase();
            let unit = match lower.as_str() {
                "unset" | "none" => LengthUnit::Unset,
                "um" | "micron" | "microns" => LengthUnit::Microns,
                "mm" | "millimeter" | "millimeters" => LengthUnit::Millimeters,
                "cm" | "centimeter" | "centimeters" => LengthUnit::Centimeters,
                "dm" | "decimeter" | "decimeters" => LengthUnit::Decimeters,
                "m" | "meter" | "meters" => LengthUnit::Meters,
                "km" | "kilometer" | "kilometers" => LengthUnit::Kilometers,
                "in" | "inch" | "inches" => LengthUnit::Inches,
                "ft" | "foot" | "feet" => LengthUnit::Feet,
                "yd" | "yard" | "yards" => LengthUnit::Yards,
                "mi" | "mile" | "miles" => LengthUnit::Miles,
                _ => return None,
            };
            Some(unit)
        }

        /// 从 `self` 到 `other` 的乘数；任一侧未设置时返回 `None`。
        pub fn ratio_to(self, other: LengthUnit) -> Option<f64> {
            Some(self.meters_per_unit()? / other.meters_per_unit()?)
        }
    }

}
