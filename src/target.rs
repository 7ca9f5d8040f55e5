//! Robot target model and its canonical `robtarget` text encoding.

use crate::error::FormatError;
use glam::{DQuat, DVec3};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// RAPID type name of a target data item on the controller.
pub const ROBTARGET_TYPE: &str = "robtarget";

/// Tool pointing straight down: RAPID `[0,0,-1,0.000000082]` (w, x, y, z).
pub const DEFAULT_ORIENTATION: DQuat = DQuat::from_xyzw(0.0, -1.0, 0.000000082, 0.0);

pub const DEFAULT_CONFIGURATION: RobotConfiguration = RobotConfiguration {
    cf1: 0,
    cf4: -1,
    cf6: 0,
    cfx: 1,
};

/// Values at or above this mark an external axis as not in use.
pub const UNDEFINED_EXTERNAL_AXIS: f64 = 9e9;

const UNDEFINED_EXTERNAL_AXIS_TEXT: &str = "9E+09";

/// Axis configuration of the robot at a target (RAPID `confdata`).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RobotConfiguration {
    /// Quadrant of axis 1.
    pub cf1: i32,
    /// Quadrant of axis 4.
    pub cf4: i32,
    /// Quadrant of axis 6.
    pub cf6: i32,
    /// Robot configuration number.
    pub cfx: i32,
}

impl Default for RobotConfiguration {
    fn default() -> Self {
        DEFAULT_CONFIGURATION
    }
}

/// A single oriented waypoint.
///
/// Encodes to the `robtarget` aggregate the controller interpreter parses:
/// `[[x,y,z],[q1,q2,q3,q4],[cf1,cf4,cf6,cfx],[e1,e2,e3,e4,e5,e6]]`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Target {
    /// TCP position in the work object frame (mm).
    pub position: DVec3,

    /// Tool orientation. Written as `[w,x,y,z]`.
    pub orientation: DQuat,

    pub configuration: RobotConfiguration,

    /// External axis positions. `None` means the axis is undefined; values at
    /// or above [`UNDEFINED_EXTERNAL_AXIS`] are not representable as `Some`.
    pub external_axes: [Option<f64>; 6],
}

impl Target {
    /// Builds a target at `point` with the default orientation and configuration
    /// and every external axis undefined.
    pub fn from_point(point: DVec3) -> Self {
        Self {
            position: point,
            orientation: DEFAULT_ORIENTATION,
            configuration: DEFAULT_CONFIGURATION,
            external_axes: [None; 6],
        }
    }

    pub fn with_orientation(mut self, orientation: DQuat) -> Self {
        self.orientation = orientation;
        self
    }

    pub fn with_configuration(mut self, configuration: RobotConfiguration) -> Self {
        self.configuration = configuration;
        self
    }

    /// Sets the external axes. A value at or above [`UNDEFINED_EXTERNAL_AXIS`]
    /// (or NaN) is stored as `None`, the same as the decoder reads it.
    pub fn with_external_axes(mut self, external_axes: [Option<f64>; 6]) -> Self {
        self.external_axes = external_axes.map(|axis| axis.and_then(defined_axis));
        self
    }

    /// Renders the canonical text form.
    pub fn encode(&self) -> String {
        self.to_string()
    }

    /// Parses the canonical text form. Whitespace and a single trailing `;` are accepted.
    pub fn decode(text: &str) -> Result<Self, FormatError> {
        let text = text.trim();
        let text = text.strip_suffix(';').unwrap_or(text).trim_end();
        let body = text
            .strip_prefix('[')
            .and_then(|t| t.strip_suffix(']'))
            .ok_or(FormatError::Unbracketed)?;

        let groups = split_groups(body)?;
        let [pos, rot, conf, ext] = groups.as_slice() else {
            return Err(FormatError::GroupCount {
                found: groups.len(),
            });
        };

        let [x, y, z] = parse_fields::<f64, 3>("trans", pos)?;
        let [q1, q2, q3, q4] = parse_fields::<f64, 4>("rot", rot)?;
        let [cf1, cf4, cf6, cfx] = parse_fields::<i32, 4>("robconf", conf)?;
        let ext = parse_fields::<f64, 6>("extax", ext)?;

        Ok(Self {
            position: DVec3::new(x, y, z),
            orientation: DQuat::from_xyzw(q2, q3, q4, q1),
            configuration: RobotConfiguration { cf1, cf4, cf6, cfx },
            external_axes: ext.map(defined_axis),
        })
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let p = self.position;
        let q = self.orientation;
        let c = self.configuration;
        write!(
            f,
            "[[{},{},{}],[{},{},{},{}],[{},{},{},{}],[",
            p.x, p.y, p.z, q.w, q.x, q.y, q.z, c.cf1, c.cf4, c.cf6, c.cfx
        )?;
        for (i, axis) in self.external_axes.iter().enumerate() {
            if i > 0 {
                f.write_str(",")?;
            }
            match axis.and_then(defined_axis) {
                Some(value) => write!(f, "{value}")?,
                None => f.write_str(UNDEFINED_EXTERNAL_AXIS_TEXT)?,
            }
        }
        f.write_str("]]")
    }
}

impl FromStr for Target {
    type Err = FormatError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::decode(s)
    }
}

fn defined_axis(value: f64) -> Option<f64> {
    (value < UNDEFINED_EXTERNAL_AXIS).then_some(value)
}

/// Splits `[a],[b],...` into the contents of each group.
fn split_groups(body: &str) -> Result<Vec<&str>, FormatError> {
    let mut groups = Vec::new();
    let mut rest = body.trim();

    while !rest.is_empty() {
        let inner = rest.strip_prefix('[').ok_or_else(|| {
            FormatError::Malformed(format!("expected `[` at `{rest}`"))
        })?;
        let end = inner
            .find(']')
            .ok_or_else(|| FormatError::Malformed("unbalanced brackets".to_string()))?;
        groups.push(&inner[..end]);

        rest = inner[end + 1..].trim_start();
        if let Some(next) = rest.strip_prefix(',') {
            rest = next.trim_start();
            if rest.is_empty() {
                return Err(FormatError::Malformed("trailing comma".to_string()));
            }
        } else if !rest.is_empty() {
            return Err(FormatError::Malformed(format!("unexpected text `{rest}`")));
        }
    }

    Ok(groups)
}

fn parse_fields<T: FromStr + Copy + Default, const N: usize>(
    group: &'static str,
    text: &str,
) -> Result<[T; N], FormatError> {
    let fields: Vec<&str> = if text.trim().is_empty() {
        Vec::new()
    } else {
        text.split(',').map(str::trim).collect()
    };
    if fields.len() != N {
        return Err(FormatError::FieldCount {
            group,
            expected: N,
            found: fields.len(),
        });
    }

    let mut out = [T::default(); N];
    for (slot, field) in out.iter_mut().zip(&fields) {
        *slot = field.parse().map_err(|_| FormatError::InvalidNumber {
            group,
            text: field.to_string(),
        })?;
    }
    Ok(out)
}
