use super::{Bound, check_bound_expression};
use crate::core::models::configuration::Configuration;
use crate::expression::{Expression, ExpressionError, ExpressionValue};
use crate::procedure::error::ProcedureError;
use crate::procedure::keywords::{KeywordError, KeywordValue, NodeValue};
use crate::procedure::node::{NodeEnv, NodeKind};
use crate::procedure::region::{Region, VoxelKernel};
use crate::procedure::registry::NodeType;
use nalgebra::Point3;
use std::collections::HashMap;
use std::sync::OnceLock;
use tracing::debug;

const POINT_VARIABLES: [&str; 6] = ["x", "y", "z", "xFrac", "yFrac", "zFrac"];

fn voxel_size(env: &mut NodeEnv<'_, '_>, value: &NodeValue) -> Result<f64, ProcedureError> {
    let size = env.evaluate_f64(value)?;
    if !(size.is_finite() && size > 0.0) {
        return Err(env.fail(format!("voxel size must be positive (got {size})")));
    }
    Ok(size)
}

fn generate(
    env: &NodeEnv<'_, '_>,
    size: f64,
    kernel: &dyn VoxelKernel,
) -> Result<Region, ProcedureError> {
    Region::generate(&*env.ctx.configuration, size, kernel).map_err(|e| env.fail(e.to_string()))
}

fn publish(env: &mut NodeEnv<'_, '_>, region: Region) -> Result<(), ProcedureError> {
    if !region.is_valid() {
        return Err(env.fail("region contains no free voxels"));
    }
    debug!(
        node = env.name,
        voxels = ?region.n_voxels(),
        free = region.free_voxel_fraction(),
        "Region generated"
    );
    env.state.outputs.set_region(env.name, region);
    Ok(())
}

/// Points at least `tolerance` away from every atom.
struct Clearance {
    tolerance_squared: f64,
}

impl VoxelKernel for Clearance {
    fn is_valid(&self, configuration: &Configuration, point: &Point3<f64>) -> bool {
        let simulation_box = configuration.simulation_box();
        configuration.atoms().all(|(_, atom)| {
            simulation_box.minimum_distance_squared(point, &atom.position)
                >= self.tolerance_squared
        })
    }
}

/// The free space of the configuration: every voxel whose centre is clear of all atoms.
#[derive(Debug)]
pub struct GeneralRegion {
    tolerance: NodeValue,
    voxel_size: NodeValue,
}

impl GeneralRegion {
    pub fn new() -> Self {
        Self {
            tolerance: NodeValue::constant(5.0),
            voxel_size: NodeValue::constant(1.0),
        }
    }
}

impl Default for GeneralRegion {
    fn default() -> Self {
        Self::new()
    }
}

impl NodeKind for GeneralRegion {
    fn node_type(&self) -> NodeType {
        NodeType::GeneralRegion
    }

    fn keywords(&self) -> Vec<(&'static str, KeywordValue)> {
        vec![
            ("Tolerance", self.tolerance.to_keyword()),
            ("VoxelSize", self.voxel_size.to_keyword()),
        ]
    }

    fn set_keyword(&mut self, keyword: &str, value: &KeywordValue) -> Result<(), KeywordError> {
        match keyword {
            "Tolerance" => self.tolerance = NodeValue::from_keyword(value)?,
            "VoxelSize" => self.voxel_size = NodeValue::from_keyword(value)?,
            _ => return Err(KeywordError::Unknown),
        }
        Ok(())
    }

    fn execute(&mut self, env: &mut NodeEnv<'_, '_>) -> Result<(), ProcedureError> {
        let tolerance = env.evaluate_f64(&self.tolerance)?;
        if tolerance < 0.0 {
            return Err(env.fail(format!("tolerance must not be negative (got {tolerance})")));
        }
        let size = voxel_size(env, &self.voxel_size)?;
        let kernel = Clearance {
            tolerance_squared: tolerance * tolerance,
        };
        let region = generate(env, size, &kernel)?;
        publish(env, region)
    }

    fn finalise(&mut self, env: &mut NodeEnv<'_, '_>) -> Result<(), ProcedureError> {
        env.state.outputs.clear_region(env.name);
        Ok(())
    }
}

/// Evaluates the region expression at each voxel centre. The first evaluation error is kept
/// and reported once the scan finishes.
struct ExpressionKernel<'s> {
    expression: &'s Expression,
    variables: &'s HashMap<String, ExpressionValue>,
    range: [f64; 2],
    failure: OnceLock<ExpressionError>,
}

impl VoxelKernel for ExpressionKernel<'_> {
    fn is_valid(&self, configuration: &Configuration, point: &Point3<f64>) -> bool {
        let fractional = configuration.simulation_box().to_fractional(point);
        let bound = [
            ("x", point.x),
            ("y", point.y),
            ("z", point.z),
            ("xFrac", fractional.x),
            ("yFrac", fractional.y),
            ("zFrac", fractional.z),
        ];
        let [min, max] = self.range;
        match self.expression.evaluate(&mut Bound::new(self.variables, &bound)) {
            Ok(value) => (min..=max).contains(&value.as_f64()),
            Err(e) => {
                let _ = self.failure.set(e);
                false
            }
        }
    }
}

/// Voxels whose centre gives a value within `[Minimum, Maximum]` for a user expression.
#[derive(Debug)]
pub struct CustomRegion {
    expression: Option<Expression>,
    minimum: f64,
    maximum: f64,
    voxel_size: NodeValue,
}

impl CustomRegion {
    pub fn new() -> Self {
        Self {
            expression: None,
            minimum: 0.0,
            maximum: 1.0,
            voxel_size: NodeValue::constant(1.0),
        }
    }
}

impl Default for CustomRegion {
    fn default() -> Self {
        Self::new()
    }
}

impl NodeKind for CustomRegion {
    fn node_type(&self) -> NodeType {
        NodeType::CustomRegion
    }

    fn keywords(&self) -> Vec<(&'static str, KeywordValue)> {
        let mut keywords = Vec::new();
        if let Some(expression) = &self.expression {
            keywords.push(("Expression", KeywordValue::text(expression.text())));
        }
        keywords.extend([
            ("Minimum", KeywordValue::Double(self.minimum)),
            ("Maximum", KeywordValue::Double(self.maximum)),
            ("VoxelSize", self.voxel_size.to_keyword()),
        ]);
        keywords
    }

    fn set_keyword(&mut self, keyword: &str, value: &KeywordValue) -> Result<(), KeywordError> {
        match keyword {
            "Expression" => {
                let expression = Expression::parse(value.as_text()?)
                    .map_err(|e| KeywordError::invalid(e.to_string()))?;
                self.expression = Some(expression);
            }
            "Minimum" => self.minimum = value.as_f64()?,
            "Maximum" => self.maximum = value.as_f64()?,
            "VoxelSize" => self.voxel_size = NodeValue::from_keyword(value)?,
            _ => return Err(KeywordError::Unknown),
        }
        Ok(())
    }

    fn prepare(&mut self, env: &mut NodeEnv<'_, '_>) -> Result<(), ProcedureError> {
        let expression = self
            .expression
            .as_ref()
            .ok_or_else(|| env.fail("no expression was given"))?;
        if self.minimum > self.maximum {
            return Err(env.fail(format!(
                "minimum {} exceeds maximum {}",
                self.minimum, self.maximum
            )));
        }
        let variables = env.state.variables.snapshot(env.scope);
        match check_bound_expression(expression, &variables, &POINT_VARIABLES) {
            Ok(()) => Ok(()),
            Err(ExpressionError::RandomUnavailable) => Err(env.fail(
                "region expressions must not use random functions",
            )),
            Err(e) => Err(ProcedureError::argument(env.name, e)),
        }
    }

    fn execute(&mut self, env: &mut NodeEnv<'_, '_>) -> Result<(), ProcedureError> {
        let Some(expression) = &self.expression else {
            return Err(env.fail("no expression was given"));
        };
        let size = voxel_size(env, &self.voxel_size)?;
        let variables = env.state.variables.snapshot(env.scope);
        let kernel = ExpressionKernel {
            expression,
            variables: &variables,
            range: [self.minimum, self.maximum],
            failure: OnceLock::new(),
        };
        let region = generate(env, size, &kernel)?;
        if let Some(e) = kernel.failure.into_inner() {
            return Err(ProcedureError::argument(env.name, e));
        }
        publish(env, region)
    }

    fn finalise(&mut self, env: &mut NodeEnv<'_, '_>) -> Result<(), ProcedureError> {
        env.state.outputs.clear_region(env.name);
        Ok(())
    }
}
