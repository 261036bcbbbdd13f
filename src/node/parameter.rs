//! Named, ranged node parameters.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// How an external editor maps a 0..1 control onto the value range
///
/// Storage is always the plain value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ParameterScale {
    #[default]
    Linear,
    Logarithmic,
}

/// A continuously valued control exposed by a node
#[derive(Debug, Clone, PartialEq)]
pub struct Parameter {
    name: &'static str,
    value: f32,
    min: f32,
    max: f32,
    default: f32,
    unit: &'static str,
    scale: ParameterScale,
}

impl Parameter {
    /// Create a linear parameter; `default` is clamped into the range
    pub fn new(name: &'static str, default: f32, min: f32, max: f32, unit: &'static str) -> Self {
        let (min, max) = if min <= max { (min, max) } else { (max, min) };
        let default = default.clamp(min, max);
        Self {
            name,
            value: default,
            min,
            max,
            default,
            unit,
            scale: ParameterScale::Linear,
        }
    }

    /// Mark the parameter as logarithmic (requires a positive range)
    pub fn logarithmic(mut self) -> Self {
        debug_assert!(self.min > 0.0, "logarithmic parameter '{}' needs min > 0", self.name);
        self.scale = ParameterScale::Logarithmic;
        self
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn value(&self) -> f32 {
        self.value
    }

    pub fn min(&self) -> f32 {
        self.min
    }

    pub fn max(&self) -> f32 {
        self.max
    }

    pub fn default_value(&self) -> f32 {
        self.default
    }

    pub fn unit(&self) -> &'static str {
        self.unit
    }

    pub fn scale(&self) -> ParameterScale {
        self.scale
    }

    /// Set the value, clamped to [min, max]; NaN is ignored
    ///
    /// Returns the stored value.
    pub fn set_value(&mut self, value: f32) -> f32 {
        if !value.is_nan() {
            self.value = value.clamp(self.min, self.max);
        }
        self.value
    }

    /// Value mapped onto 0..1 according to the scale
    pub fn normalized(&self) -> f32 {
        if self.max <= self.min {
            return 0.0;
        }
        match self.scale {
            ParameterScale::Linear => (self.value - self.min) / (self.max - self.min),
            ParameterScale::Logarithmic if self.min > 0.0 => {
                (self.value / self.min).ln() / (self.max / self.min).ln()
            }
            ParameterScale::Logarithmic => (self.value - self.min) / (self.max - self.min),
        }
    }

    /// Set the value from a 0..1 control position
    pub fn set_normalized(&mut self, position: f32) -> f32 {
        let position = position.clamp(0.0, 1.0);
        let value = match self.scale {
            ParameterScale::Logarithmic if self.min > 0.0 => {
                self.min * (self.max / self.min).powf(position)
            }
            _ => self.min + position * (self.max - self.min),
        };
        self.set_value(value)
    }

    /// Restore the default value
    pub fn reset(&mut self) {
        self.value = self.default;
    }
}

/// Ordered parameter list with a cached name → index table
///
/// Processors read parameters by index in their hot loops; the name table
/// serves patch restore and external editors.
#[derive(Debug, Clone, Default)]
pub struct ParameterSet {
    params: Vec<Parameter>,
    index: HashMap<&'static str, usize>,
}

impl ParameterSet {
    /// Declare the next parameter and return its index
    ///
    /// Names must be unique within a node.
    pub fn add(&mut self, param: Parameter) -> usize {
        debug_assert!(
            !self.index.contains_key(param.name()),
            "duplicate parameter name '{}'",
            param.name()
        );
        let idx = self.params.len();
        self.index.insert(param.name(), idx);
        self.params.push(param);
        idx
    }

    /// Current value by index (0.0 for an unknown index)
    #[inline]
    pub fn value(&self, idx: usize) -> f32 {
        self.params.get(idx).map_or(0.0, Parameter::value)
    }

    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.index.get(name).copied()
    }

    pub fn get(&self, name: &str) -> Option<&Parameter> {
        self.index_of(name).map(|idx| &self.params[idx])
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut Parameter> {
        self.index_of(name).map(move |idx| &mut self.params[idx])
    }

    pub fn by_index(&self, idx: usize) -> Option<&Parameter> {
        self.params.get(idx)
    }

    /// Set by index; returns the clamped value, or None for an unknown index
    pub fn set(&mut self, idx: usize, value: f32) -> Option<f32> {
        self.params.get_mut(idx).map(|p| p.set_value(value))
    }

    pub fn iter(&self) -> impl Iterator<Item = &Parameter> {
        self.params.iter()
    }

    pub fn len(&self) -> usize {
        self.params.len()
    }

    pub fn is_empty(&self) -> bool {
        self.params.is_empty()
    }
}
