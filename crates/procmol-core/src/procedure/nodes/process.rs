use super::optional_text;
use crate::core::data::store::DataStore;
use crate::procedure::error::ProcedureError;
use crate::procedure::keywords::{KeywordError, KeywordValue};
use crate::procedure::node::{NodeEnv, NodeKind, Reference};
use crate::procedure::registry::NodeType;
use crate::procedure::sequence::Sequence;
use crate::procedure::state::ProcessOperand;
use tracing::info;

const SOURCES: [&[NodeType]; 3] = [
    &[NodeType::Collect1D],
    &[NodeType::Collect2D],
    &[NodeType::Collect3D],
];

/// Turns a collected histogram into normalised data.
///
/// Each execute counts one pass, averages the histogram over the passes so far, hands the
/// result to the `Normalisation` branch and stores whatever comes back under the node's
/// data key.
#[derive(Debug)]
pub struct Process {
    rank: usize,
    source: Option<String>,
    label: String,
    normalisation: Sequence,
    passes: u64,
}

impl Process {
    /// # Panics
    ///
    /// Panics if `rank` is not 1, 2 or 3.
    pub fn new(rank: usize) -> Self {
        assert!((1..=3).contains(&rank), "process rank must be 1, 2 or 3");
        Self {
            rank,
            source: None,
            label: String::new(),
            normalisation: Sequence::branch("Normalisation"),
            passes: 0,
        }
    }
}

impl NodeKind for Process {
    fn node_type(&self) -> NodeType {
        match self.rank {
            1 => NodeType::Process1D,
            2 => NodeType::Process2D,
            _ => NodeType::Process3D,
        }
    }

    fn keywords(&self) -> Vec<(&'static str, KeywordValue)> {
        let mut keywords = Vec::new();
        if let Some(source) = &self.source {
            keywords.push(("SourceData", KeywordValue::text(source)));
        }
        if !self.label.is_empty() {
            keywords.push(("Label", KeywordValue::text(&self.label)));
        }
        keywords
    }

    fn set_keyword(&mut self, keyword: &str, value: &KeywordValue) -> Result<(), KeywordError> {
        match keyword {
            "SourceData" => self.source = optional_text(value)?,
            "Label" => self.label = value.as_text()?.to_string(),
            _ => return Err(KeywordError::Unknown),
        }
        Ok(())
    }

    fn references(&self) -> Vec<Reference> {
        self.source
            .iter()
            .map(|s| Reference::new("SourceData", s, SOURCES[self.rank - 1]))
            .collect()
    }

    fn branch(&self) -> Option<&Sequence> {
        Some(&self.normalisation)
    }

    fn branch_mut(&mut self) -> Option<&mut Sequence> {
        Some(&mut self.normalisation)
    }

    fn prepare(&mut self, env: &mut NodeEnv<'_, '_>) -> Result<(), ProcedureError> {
        if self.source.is_none() {
            return Err(env.fail("no source data was given"));
        }
        self.passes = 0;
        Ok(())
    }

    fn execute(&mut self, env: &mut NodeEnv<'_, '_>) -> Result<(), ProcedureError> {
        let source = self.source.as_deref().unwrap_or_default();
        let key = env.ctx.data_key(source);
        let histogram = env
            .ctx
            .data
            .histogram(&key)
            .ok_or_else(|| env.fail(format!("no histogram exists at '{key}'")))?;
        self.passes += 1;
        let operand = ProcessOperand {
            data: histogram.to_data(self.passes),
            axes: histogram.axes().to_vec(),
        };

        env.state.outputs.operand = Some(operand);
        let result = env.run_branch(&mut self.normalisation);
        let operand = env.state.outputs.operand.take();
        result?;
        let operand = operand.ok_or_else(|| env.fail("normalisation discarded the data"))?;
        let key = env.data_key();
        env.ctx.data.set_data(&key, operand.data);
        Ok(())
    }

    fn finalise(&mut self, env: &mut NodeEnv<'_, '_>) -> Result<(), ProcedureError> {
        info!(
            node = env.name,
            key = %DataStore::key(&env.ctx.prefix, env.name),
            label = %self.label,
            passes = self.passes,
            "Processed data stored"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use crate::core::utils::geometry::spherical_shell_volume;
    use crate::procedure::testing::{BOX_LENGTH, Harness, lattice_point};

    const PIPELINE: &str = r#"
context = "Analysis"

[[node]]
type = "Select"
name = "A"
Site = [["Argon", "Ar"]]

[[node]]
type = "IterateSelection"
Selection = "A"

[[node.ForEach]]
type = "Select"
name = "B"
Site = [["Argon", "Ar"]]
ExcludeSameMolecule = ["A"]

[[node.ForEach]]
type = "IterateSelection"
Selection = "B"

[[node.ForEach.ForEach]]
type = "CalculateDistance"
name = "rAB"
I = "A"
J = "B"

[[node.ForEach.ForEach]]
type = "Collect1D"
name = "Histo"
QuantityX = "rAB"
RangeX = [0.0, 10.0, 1.0]

[[node]]
type = "Process1D"
name = "RDF"
SourceData = "Histo"
Label = "g(r)"
"#;

    fn argon_triangle() -> Harness {
        let mut harness = Harness::new();
        harness.add_molecules("Argon", [0, 1, 2].into_iter().map(lattice_point));
        harness
    }

    #[test]
    fn averages_counts_over_passes() {
        let mut harness = argon_triangle();
        let mut procedure = crate::procedure::serialization::from_toml_str(PIPELINE).unwrap();
        harness.run_times(&mut procedure, 4).unwrap();
        let data = harness.data.data("Test//RDF").unwrap();
        assert_eq!(data.values()[4], 4.0);
        assert_eq!(data.values()[8], 2.0);
    }

    #[test]
    fn normalisation_chain_runs_in_order() {
        let mut harness = argon_triangle();
        let text = PIPELINE.to_string()
            + r#"
[[node.Normalisation]]
type = "OperateSitePopulationNormalise"
Site = ["A"]

[[node.Normalisation]]
type = "OperateNumberDensityNormalise"
Site = ["B"]

[[node.Normalisation]]
type = "OperateSphericalShellNormalise"
"#;
        harness.run_toml(&text).unwrap();
        let data = harness.data.data("Test//RDF").unwrap();
        let volume = BOX_LENGTH.powi(3);
        // 3 A sites on average, 2 B sites on average
        let expected = 4.0 / 3.0 / (2.0 / volume) / spherical_shell_volume(4.0, 5.0);
        assert!((data.values()[4] - expected).abs() < 1e-9 * expected);
        assert_eq!(data.values()[0], 0.0);
    }

    #[test]
    fn source_data_must_match_the_rank() {
        let err = crate::procedure::serialization::from_toml_str(
            &PIPELINE.replace("Process1D", "Process2D"),
        )
        .unwrap_err();
        assert!(matches!(
            err,
            crate::procedure::error::ProcedureError::UnresolvedReference { .. }
        ));
    }
}
