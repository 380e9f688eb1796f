use super::optional_text;
use crate::core::data::histogram::Axis;
use crate::procedure::error::ProcedureError;
use crate::procedure::keywords::{KeywordError, KeywordValue};
use crate::procedure::node::{NodeEnv, NodeKind, Reference};
use crate::procedure::registry::NodeType;
use crate::procedure::sequence::Sequence;

const CALCULATE: &[NodeType] = &[NodeType::CalculateDistance, NodeType::CalculateAngle];
const QUANTITY_KEYWORDS: [&str; 3] = ["QuantityX", "QuantityY", "QuantityZ"];
const RANGE_KEYWORDS: [&str; 3] = ["RangeX", "RangeY", "RangeZ"];

/// Bins calculated observables into a 1-, 2- or 3-dimensional histogram.
///
/// The histogram lives in the data store so that it accumulates across executes; it is
/// created, or zeroed when it already exists, at prepare. `SubCollect` runs only after a
/// value lands inside the histogram's range.
#[derive(Debug)]
pub struct Collect {
    rank: usize,
    quantities: [Option<String>; 3],
    ranges: [[f64; 3]; 3],
    sub_collect: Sequence,
    key: String,
}

impl Collect {
    /// # Panics
    ///
    /// Panics if `rank` is not 1, 2 or 3.
    pub fn new(rank: usize) -> Self {
        assert!((1..=3).contains(&rank), "collect rank must be 1, 2 or 3");
        Self {
            rank,
            quantities: Default::default(),
            ranges: [[0.0, 10.0, 0.05]; 3],
            sub_collect: Sequence::branch("SubCollect"),
            key: String::new(),
        }
    }

    pub fn rank(&self) -> usize {
        self.rank
    }
}

impl NodeKind for Collect {
    fn node_type(&self) -> NodeType {
        match self.rank {
            1 => NodeType::Collect1D,
            2 => NodeType::Collect2D,
            _ => NodeType::Collect3D,
        }
    }

    fn keywords(&self) -> Vec<(&'static str, KeywordValue)> {
        let mut keywords = Vec::new();
        for axis in 0..self.rank {
            if let Some(quantity) = &self.quantities[axis] {
                keywords.push((QUANTITY_KEYWORDS[axis], KeywordValue::text(quantity)));
            }
            keywords.push((RANGE_KEYWORDS[axis], KeywordValue::doubles(&self.ranges[axis])));
        }
        keywords
    }

    fn set_keyword(&mut self, keyword: &str, value: &KeywordValue) -> Result<(), KeywordError> {
        let axis_of = |names: &[&str; 3]| names[..self.rank].iter().position(|k| *k == keyword);
        if let Some(axis) = axis_of(&QUANTITY_KEYWORDS) {
            self.quantities[axis] = optional_text(value)?;
        } else if let Some(axis) = axis_of(&RANGE_KEYWORDS) {
            let [min, max, width] = value.as_f64_array::<3>()?;
            Axis::new(min, max, width).map_err(|e| KeywordError::invalid(e.to_string()))?;
            self.ranges[axis] = [min, max, width];
        } else {
            return Err(KeywordError::Unknown);
        }
        Ok(())
    }

    fn references(&self) -> Vec<Reference> {
        (0..self.rank)
            .filter_map(|axis| {
                self.quantities[axis]
                    .as_deref()
                    .map(|q| Reference::new(QUANTITY_KEYWORDS[axis], q, CALCULATE))
            })
            .collect()
    }

    fn branch(&self) -> Option<&Sequence> {
        Some(&self.sub_collect)
    }

    fn branch_mut(&mut self) -> Option<&mut Sequence> {
        Some(&mut self.sub_collect)
    }

    fn prepare(&mut self, env: &mut NodeEnv<'_, '_>) -> Result<(), ProcedureError> {
        if let Some(axis) = (0..self.rank).find(|a| self.quantities[*a].is_none()) {
            return Err(env.fail(format!("no quantity was given for '{}'", QUANTITY_KEYWORDS[axis])));
        }
        let axes = self.ranges[..self.rank]
            .iter()
            .map(|[min, max, width]| Axis::new(*min, *max, *width))
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| env.fail(e.to_string()))?;
        self.key = env.data_key();
        env.ctx.data.realise_histogram(&self.key, &axes).zero();
        Ok(())
    }

    fn execute(&mut self, env: &mut NodeEnv<'_, '_>) -> Result<(), ProcedureError> {
        let mut values = [0.0; 3];
        for axis in 0..self.rank {
            let name = self.quantities[axis].as_deref().unwrap_or_default();
            values[axis] = env
                .state
                .outputs
                .observable(name)
                .ok_or_else(|| env.fail(format!("'{name}' has not calculated a value")))?;
        }
        let histogram = env
            .ctx
            .data
            .histogram_mut(&self.key)
            .ok_or(ProcedureError::NotValidated)?;
        if histogram.bin(&values[..self.rank]) {
            env.run_branch(&mut self.sub_collect)?;
        }
        Ok(())
    }
}
