//! Common value types for 3D load planning.
//!
//! Cartons are measured in centimeters, containers in meters. The helpers in
//! this module are the only place where the two unit systems meet.

use std::fmt;
use std::ops::{Add, Mul, Sub};

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Global numerical tolerance for floating-point comparisons.
pub const EPSILON_GENERAL: f64 = 1e-6;

/// Centimeters per meter.
pub const CM_PER_METER: f64 = 100.0;

/// Cubic centimeters per cubic meter.
pub const CM3_PER_M3: f64 = 1_000_000.0;

/// Converts meters to centimeters, snapping away binary drift (`5.9 * 100.0`).
#[inline]
pub fn meters_to_cm(meters: f64) -> f64 {
    (meters * CM_PER_METER * 1e6).round() / 1e6
}

/// Converts a volume in cubic centimeters to cubic meters.
#[inline]
pub fn cm3_to_m3(volume_cm3: f64) -> f64 {
    volume_cm3 / CM3_PER_M3
}

/// Represents a 3D vector or point in space.
///
/// `x` runs along the container length, `y` along its width and `z` upwards.
///
/// # Examples
/// ```
/// use load_planner::types::Vec3;
///
/// let position = Vec3::new(10.0, 20.0, 0.0);
/// let size = Vec3::new(40.0, 30.0, 30.0);
/// let center = position + size * 0.5;
/// assert_eq!(center, Vec3::new(30.0, 35.0, 15.0));
/// ```
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Vec3 {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Vec3 {
    #[inline]
    pub const fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    /// Creates a zero vector (origin).
    #[inline]
    pub const fn zero() -> Self {
        Self::new(0.0, 0.0, 0.0)
    }
}

impl Add for Vec3 {
    type Output = Self;

    #[inline]
    fn add(self, rhs: Self) -> Self::Output {
        Self::new(self.x + rhs.x, self.y + rhs.y, self.z + rhs.z)
    }
}

impl Sub for Vec3 {
    type Output = Self;

    #[inline]
    fn sub(self, rhs: Self) -> Self::Output {
        Self::new(self.x - rhs.x, self.y - rhs.y, self.z - rhs.z)
    }
}

impl Mul<f64> for Vec3 {
    type Output = Self;

    #[inline]
    fn mul(self, scalar: f64) -> Self::Output {
        Self::new(self.x * scalar, self.y * scalar, self.z * scalar)
    }
}

/// Length, width and height of a carton or container.
///
/// Immutable value type; the unit depends on the owner (cm for cartons, m for containers).
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Dimensions {
    pub length: f64,
    pub width: f64,
    pub height: f64,
}

impl Dimensions {
    #[inline]
    pub const fn new(length: f64, width: f64, height: f64) -> Self {
        Self {
            length,
            width,
            height,
        }
    }

    /// Product of all three edges.
    #[inline]
    pub fn volume(&self) -> f64 {
        self.length * self.width * self.height
    }

    /// Floor area (length × width).
    #[inline]
    pub fn footprint_area(&self) -> f64 {
        self.length * self.width
    }

    /// Returns the dimensions after a rotation about the vertical axis.
    ///
    /// Only length and width swap; height is never changed.
    #[inline]
    pub fn rotated(&self, rotation: Rotation) -> Self {
        match rotation {
            Rotation::None => *self,
            Rotation::Quarter => Self::new(self.width, self.length, self.height),
        }
    }

    /// Same dimensions expressed in centimeters, assuming `self` is in meters.
    #[inline]
    pub fn meters_to_cm(&self) -> Self {
        Self::new(
            meters_to_cm(self.length),
            meters_to_cm(self.width),
            meters_to_cm(self.height),
        )
    }

    /// Checks if all edges are positive and finite.
    #[inline]
    pub fn is_valid(&self) -> bool {
        [self.length, self.width, self.height]
            .iter()
            .all(|v| *v > 0.0 && v.is_finite())
    }

    /// Checks if these dimensions fit within `outer` edge by edge.
    #[inline]
    pub fn fits_within(&self, outer: &Self, tolerance: f64) -> bool {
        self.length <= outer.length + tolerance
            && self.width <= outer.width + tolerance
            && self.height <= outer.height + tolerance
    }

    /// The dimensions as an extent vector (`length → x`, `width → y`, `height → z`).
    #[inline]
    pub fn as_vec3(&self) -> Vec3 {
        Vec3::new(self.length, self.width, self.height)
    }
}

/// Rotation of a carton about the vertical axis.
///
/// Serialized as the angle in degrees (`0` or `90`).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "u16", try_from = "u16")]
pub enum Rotation {
    None,
    Quarter,
}

impl Rotation {
    /// Rotations in the order the placement search tries them.
    pub const ALL: [Rotation; 2] = [Rotation::None, Rotation::Quarter];

    pub const fn degrees(self) -> u16 {
        match self {
            Rotation::None => 0,
            Rotation::Quarter => 90,
        }
    }
}

impl From<Rotation> for u16 {
    fn from(rotation: Rotation) -> Self {
        rotation.degrees()
    }
}

impl TryFrom<u16> for Rotation {
    type Error = String;

    fn try_from(degrees: u16) -> Result<Self, Self::Error> {
        match degrees {
            0 => Ok(Rotation::None),
            90 => Ok(Rotation::Quarter),
            other => Err(format!("rotation must be 0 or 90 degrees, got {}", other)),
        }
    }
}

impl fmt::Display for Rotation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}°", self.degrees())
    }
}

/// Center of gravity calculation helper.
///
/// Accumulates weighted points and yields their weighted average.
#[derive(Clone, Debug, Default)]
pub struct CenterOfGravityCalculator {
    weighted: Vec3,
    total_weight: f64,
}

impl CenterOfGravityCalculator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a point carrying `weight`.
    pub fn add_point(&mut self, point: Vec3, weight: f64) {
        self.weighted = self.weighted + point * weight;
        self.total_weight += weight;
    }

    /// Returns `None` while no weight has been accumulated.
    pub fn compute(&self) -> Option<Vec3> {
        if self.total_weight <= 0.0 {
            None
        } else {
            Some(self.weighted * (1.0 / self.total_weight))
        }
    }
}

/// Clamps a score into the closed range `[0, 100]`.
#[inline]
pub fn clamp_score(score: f64) -> f64 {
    if score.is_nan() {
        0.0
    } else {
        score.clamp(0.0, 100.0)
    }
}

/// Ratio in percent; zero when the capacity is not positive.
#[inline]
pub fn percent_of(value: f64, capacity: f64) -> f64 {
    if capacity <= 0.0 {
        0.0
    } else {
        value / capacity * 100.0
    }
}
