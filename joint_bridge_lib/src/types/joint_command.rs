use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Field of the published mapping that carries the joint positions.
pub const JOINTS_FIELD: &str = "Joints";

/// Target joint positions in the robot model's units, ordered by joint.
///
/// Wire form: `{"Joints": [0.1, 0.2, ...]}`. Extra fields are ignored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JointCommand {
    #[serde(rename = "Joints", default)]
    pub joints: Vec<f64>,
}

/// Why a received payload was not applied to the robot.
#[derive(Debug, thiserror::Error)]
pub enum DropReason {
    #[error("payload is not valid JSON: {0}")]
    Malformed(#[from] serde_json::Error),

    #[error("payload is not a JSON object")]
    NotAnObject,

    #[error("`Joints` is not a list")]
    JointsNotAList,

    #[error("no joint positions in payload")]
    Empty,

    #[error("expected {expected} joint positions, got {actual}")]
    DofMismatch { expected: usize, actual: usize },

    #[error("joint {index} is not a number")]
    NonNumericJoint { index: usize },

    #[error("robot rejected joint target: {0}")]
    Actuation(String),
}

impl JointCommand {
    pub fn new(joints: Vec<f64>) -> Self {
        Self { joints }
    }

    pub fn len(&self) -> usize {
        self.joints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.joints.is_empty()
    }

    /// Decode a published payload and check it against the robot's DOF.
    ///
    /// A missing or `null` `Joints` field counts as an empty list. Shape is
    /// checked before the values are converted, so a list of the wrong
    /// length is reported as a mismatch even if it holds non-numbers.
    /// Numeric strings and booleans convert like numbers (`"0.1"` is 0.1,
    /// `true` is 1.0); anything else is rejected.
    pub fn decode(payload: &[u8], dof: usize) -> Result<Self, DropReason> {
        let value: Value = serde_json::from_slice(payload)?;
        let Value::Object(mut fields) = value else {
            return Err(DropReason::NotAnObject);
        };

        let raw = match fields.remove(JOINTS_FIELD) {
            None | Some(Value::Null) => Vec::new(),
            Some(Value::Array(items)) => items,
            Some(_) => return Err(DropReason::JointsNotAList),
        };

        if raw.is_empty() {
            return Err(DropReason::Empty);
        }
        if raw.len() != dof {
            return Err(DropReason::DofMismatch {
                expected: dof,
                actual: raw.len(),
            });
        }

        let joints = raw
            .iter()
            .enumerate()
            .map(|(index, item)| {
                joint_value(item).ok_or(DropReason::NonNumericJoint { index })
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self { joints })
    }

    pub fn encode(&self) -> serde_json::Result<Vec<u8>> {
        serde_json::to_vec(self)
    }

    /// Single-precision target array as submitted to the simulator.
    pub fn to_f32(&self) -> Vec<f32> {
        self.joints.iter().map(|&j| j as f32).collect()
    }
}

fn joint_value(item: &Value) -> Option<f64> {
    match item {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        Value::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
        _ => None,
    }
}
