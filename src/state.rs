//! Saving and restoring parameter values.
//!
//! The state is a JSON object containing a version number and a map from parameter ids to plain,
//! unnormalized values. Enum parameters are stored by their variant's stable id. Restored values
//! are written straight to the parameters, and the processor picks them up on its next block like
//! any other parameter change.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::error::StateError;
use crate::params::{Param, ParamPtr, Params};

/// The current state format version. Older versions can still be loaded.
pub const STATE_VERSION: u32 = 1;

/// A plain, unnormalized value for a parameter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParamValue {
    F32(f32),
    Bool(bool),
    /// The stable id of an enum parameter's variant.
    String(String),
}

/// A parameter store's state so it can be restored at a later point.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EqState {
    pub version: u32,
    /// The parameter values, stored unnormalized. That means the old values will be recalled when a
    /// parameter's range gets extended.
    pub params: BTreeMap<String, ParamValue>,
}

impl ParamValue {
    fn read(param: ParamPtr) -> Self {
        match param {
            ParamPtr::FloatParam(p) => ParamValue::F32(p.plain_value()),
            ParamPtr::BoolParam(p) => ParamValue::Bool(p.plain_value()),
            ParamPtr::EnumParam(p) => ParamValue::String(String::from(p.id())),
        }
    }
}

/// Capture the current value of every parameter in `params`.
pub fn serialize_object<P: Params + ?Sized>(params: &P) -> EqState {
    EqState {
        version: STATE_VERSION,
        params: params
            .param_map()
            .into_iter()
            .map(|(id, param, _)| (id, ParamValue::read(param)))
            .collect(),
    }
}

/// Serialize the current value of every parameter in `params` to pretty-printed JSON.
pub fn serialize_json<P: Params + ?Sized>(params: &P) -> Result<String, StateError> {
    Ok(serde_json::to_string_pretty(&serialize_object(params))?)
}

/// Write the values from `state` to `params`. Unknown ids and values of the wrong type are logged
/// and skipped, and parameters missing from the state keep their current value. Returns the number
/// of parameters that were restored.
pub fn deserialize_object<P: Params + ?Sized>(
    params: &P,
    state: &EqState,
) -> Result<usize, StateError> {
    if state.version > STATE_VERSION {
        return Err(StateError::UnsupportedVersion(state.version));
    }

    let param_map = params.param_map();
    let mut num_restored = 0;
    for (id, value) in &state.params {
        let param = match param_map.iter().find(|(param_id, _, _)| param_id == id) {
            Some((_, param, _)) => *param,
            None => {
                peq_warn!("Unknown parameter '{}' in the saved state, skipping", id);
                continue;
            }
        };

        let restored = match (param, value) {
            (ParamPtr::FloatParam(p), ParamValue::F32(v)) => {
                p.set_plain_value(*v);
                true
            }
            (ParamPtr::BoolParam(p), ParamValue::Bool(b)) => {
                p.set_plain_value(*b);
                true
            }
            (ParamPtr::EnumParam(p), ParamValue::String(variant_id)) => {
                let restored = p.set_from_id(variant_id);
                if !restored {
                    peq_warn!("Unknown variant '{}' for parameter '{}'", variant_id, id);
                }

                restored
            }
            (param, value) => {
                peq_warn!(
                    "Value {:?} has the wrong type for parameter '{}' ({}), skipping",
                    value,
                    id,
                    param.name()
                );
                false
            }
        };

        if restored {
            num_restored += 1;
        }
    }

    peq_trace!("Restored {} parameter values", num_restored);

    Ok(num_restored)
}

/// Parse `json` and restore it through [`deserialize_object()`].
pub fn deserialize_json<P: Params + ?Sized>(params: &P, json: &str) -> Result<usize, StateError> {
    let state: EqState = serde_json::from_str(json)?;

    deserialize_object(params, &state)
}
