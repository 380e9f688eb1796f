use super::{node_values, node_values_keyword};
use crate::core::models::simbox::SimBox;
use crate::procedure::error::ProcedureError;
use crate::procedure::keywords::{KeywordError, KeywordValue, NodeValue};
use crate::procedure::node::{NodeEnv, NodeKind};
use crate::procedure::registry::NodeType;
use nalgebra::Vector3;
use tracing::info;

/// Replaces the configuration's simulation box.
#[derive(Debug)]
pub struct BoxNode {
    lengths: [NodeValue; 3],
    angles: [NodeValue; 3],
    non_periodic: bool,
}

impl BoxNode {
    pub fn new() -> Self {
        Self {
            lengths: [1.0, 1.0, 1.0].map(NodeValue::constant),
            angles: [90.0, 90.0, 90.0].map(NodeValue::constant),
            non_periodic: false,
        }
    }
}

impl Default for BoxNode {
    fn default() -> Self {
        Self::new()
    }
}

impl NodeKind for BoxNode {
    fn node_type(&self) -> NodeType {
        NodeType::Box
    }

    fn keywords(&self) -> Vec<(&'static str, KeywordValue)> {
        vec![
            ("Lengths", node_values_keyword(&self.lengths)),
            ("Angles", node_values_keyword(&self.angles)),
            ("NonPeriodic", KeywordValue::Bool(self.non_periodic)),
        ]
    }

    fn set_keyword(&mut self, keyword: &str, value: &KeywordValue) -> Result<(), KeywordError> {
        match keyword {
            "Lengths" => self.lengths = node_values(value)?,
            "Angles" => self.angles = node_values(value)?,
            "NonPeriodic" => self.non_periodic = value.as_bool()?,
            _ => return Err(KeywordError::Unknown),
        }
        Ok(())
    }

    fn execute(&mut self, env: &mut NodeEnv<'_, '_>) -> Result<(), ProcedureError> {
        let mut lengths = Vector3::zeros();
        let mut angles = Vector3::zeros();
        for axis in 0..3 {
            lengths[axis] = env.evaluate_f64(&self.lengths[axis])?;
            angles[axis] = env.evaluate_f64(&self.angles[axis])?;
        }
        let simulation_box = if self.non_periodic {
            SimBox::non_periodic(lengths)
        } else {
            SimBox::new(lengths, angles)
        }
        .map_err(|e| env.fail(e.to_string()))?;

        info!(
            kind = ?simulation_box.kind(),
            volume = simulation_box.volume(),
            "Box created"
        );
        env.ctx.configuration.set_box(simulation_box);
        Ok(())
    }
}

/// Sets the configuration temperature.
#[derive(Debug)]
pub struct TemperatureNode {
    temperature: NodeValue,
}

impl TemperatureNode {
    pub fn new() -> Self {
        Self {
            temperature: NodeValue::constant(300.0),
        }
    }
}

impl Default for TemperatureNode {
    fn default() -> Self {
        Self::new()
    }
}

impl NodeKind for TemperatureNode {
    fn node_type(&self) -> NodeType {
        NodeType::Temperature
    }

    fn keywords(&self) -> Vec<(&'static str, KeywordValue)> {
        vec![("Temperature", self.temperature.to_keyword())]
    }

    fn set_keyword(&mut self, keyword: &str, value: &KeywordValue) -> Result<(), KeywordError> {
        match keyword {
            "Temperature" => self.temperature = NodeValue::from_keyword(value)?,
            _ => return Err(KeywordError::Unknown),
        }
        Ok(())
    }

    fn execute(&mut self, env: &mut NodeEnv<'_, '_>) -> Result<(), ProcedureError> {
        let temperature = env.evaluate_f64(&self.temperature)?;
        if temperature < 0.0 {
            return Err(env.fail(format!("temperature must not be negative (got {temperature})")));
        }
        env.ctx.configuration.set_temperature(temperature);
        Ok(())
    }
}

/// Requests a size factor for the configuration and applies it by isotropic scaling.
#[derive(Debug)]
pub struct SizeFactorNode {
    factor: NodeValue,
}

impl SizeFactorNode {
    pub fn new() -> Self {
        Self {
            factor: NodeValue::constant(1.0),
        }
    }
}

impl Default for SizeFactorNode {
    fn default() -> Self {
        Self::new()
    }
}

impl NodeKind for SizeFactorNode {
    fn node_type(&self) -> NodeType {
        NodeType::SizeFactor
    }

    fn keywords(&self) -> Vec<(&'static str, KeywordValue)> {
        vec![("SizeFactor", self.factor.to_keyword())]
    }

    fn set_keyword(&mut self, keyword: &str, value: &KeywordValue) -> Result<(), KeywordError> {
        match keyword {
            "SizeFactor" => self.factor = NodeValue::from_keyword(value)?,
            _ => return Err(KeywordError::Unknown),
        }
        Ok(())
    }

    fn execute(&mut self, env: &mut NodeEnv<'_, '_>) -> Result<(), ProcedureError> {
        let factor = env.evaluate_f64(&self.factor)?;
        if factor < 1.0 {
            return Err(env.fail(format!("size factor must be at least 1.0 (got {factor})")));
        }
        let configuration = &mut *env.ctx.configuration;
        configuration.set_requested_size_factor(factor);

        let ratio = factor / configuration.applied_size_factor();
        if (ratio - 1.0).abs() > f64::EPSILON {
            let factors = Vector3::repeat(ratio);
            configuration.scale_contents(&factors);
            configuration.scale_box(&factors);
            configuration.set_applied_size_factor(factor);
            info!(factor, "Size factor applied");
        }
        Ok(())
    }
}
