use super::optional_text;
use crate::procedure::error::ProcedureError;
use crate::procedure::keywords::{KeywordError, KeywordValue};
use crate::procedure::node::{NodeEnv, NodeKind, Reference};
use crate::procedure::registry::NodeType;
use nalgebra::Point3;

const SELECT: &[NodeType] = &[NodeType::Select];
const SITE_KEYWORDS: [&str; 3] = ["I", "J", "K"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Observable {
    Distance,
    Angle,
}

impl Observable {
    fn n_sites(self) -> usize {
        match self {
            Self::Distance => 2,
            Self::Angle => 3,
        }
    }
}

/// Computes a geometric quantity from the current sites of other `Select` nodes.
///
/// The value is published as an observable under the node's name and is absent until the
/// first successful execute.
#[derive(Debug)]
pub struct Calculate {
    observable: Observable,
    sites: [Option<String>; 3],
}

impl Calculate {
    pub fn distance() -> Self {
        Self {
            observable: Observable::Distance,
            sites: Default::default(),
        }
    }

    /// Angle `i-j-k` in degrees, with `j` at the vertex.
    pub fn angle() -> Self {
        Self {
            observable: Observable::Angle,
            sites: Default::default(),
        }
    }

    pub fn observable(&self) -> Observable {
        self.observable
    }

    fn used(&self) -> impl Iterator<Item = (&'static str, &Option<String>)> {
        SITE_KEYWORDS
            .into_iter()
            .zip(&self.sites)
            .take(self.observable.n_sites())
    }
}

impl NodeKind for Calculate {
    fn node_type(&self) -> NodeType {
        match self.observable {
            Observable::Distance => NodeType::CalculateDistance,
            Observable::Angle => NodeType::CalculateAngle,
        }
    }

    fn keywords(&self) -> Vec<(&'static str, KeywordValue)> {
        self.used()
            .filter_map(|(keyword, site)| site.as_deref().map(|s| (keyword, KeywordValue::text(s))))
            .collect()
    }

    fn set_keyword(&mut self, keyword: &str, value: &KeywordValue) -> Result<(), KeywordError> {
        let index = SITE_KEYWORDS[..self.observable.n_sites()]
            .iter()
            .position(|k| *k == keyword)
            .ok_or(KeywordError::Unknown)?;
        self.sites[index] = optional_text(value)?;
        Ok(())
    }

    fn references(&self) -> Vec<Reference> {
        self.used()
            .filter_map(|(keyword, site)| site.as_deref().map(|s| Reference::new(keyword, s, SELECT)))
            .collect()
    }

    fn prepare(&mut self, env: &mut NodeEnv<'_, '_>) -> Result<(), ProcedureError> {
        if let Some((keyword, _)) = self.used().find(|(_, site)| site.is_none()) {
            return Err(env.fail(format!("no site was given for '{keyword}'")));
        }
        env.state.outputs.set_observable(env.name, None);
        Ok(())
    }

    fn execute(&mut self, env: &mut NodeEnv<'_, '_>) -> Result<(), ProcedureError> {
        let mut points: Vec<Point3<f64>> = Vec::with_capacity(3);
        for (_, site) in self.used() {
            let name = site.as_deref().unwrap_or_default();
            let current = env
                .state
                .outputs
                .current_site(name)
                .ok_or_else(|| env.fail(format!("'{name}' has no current site")))?;
            points.push(current.site.origin);
        }
        let simulation_box = env.ctx.configuration.simulation_box();
        let value = match (self.observable, points.as_slice()) {
            (Observable::Distance, [i, j]) => simulation_box.minimum_distance(i, j),
            (Observable::Angle, [i, j, k]) => simulation_box.angle_in_degrees(i, j, k),
            _ => unreachable!("site count is fixed by the observable"),
        };
        env.state.outputs.set_observable(env.name, Some(value));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::models::element::atomic_mass;
    use crate::procedure::testing::Harness;

    #[test]
    fn angle_nodes_accept_k_but_distance_nodes_do_not() {
        let mut distance = Calculate::distance();
        assert_eq!(
            distance.set_keyword("K", &KeywordValue::text("A")),
            Err(KeywordError::Unknown)
        );
        let mut angle = Calculate::angle();
        angle.set_keyword("K", &KeywordValue::text("A")).unwrap();
        assert_eq!(angle.keywords(), vec![("K", KeywordValue::text("A"))]);
    }

    #[test]
    fn distance_and_angle_in_a_nested_loop() {
        let mut harness = Harness::water(1);
        let procedure = harness
            .run_toml(
                r#"
context = "Analysis"

[[node]]
type = "Select"
name = "O"
Site = [["Water", "O"]]

[[node]]
type = "Select"
name = "H"
Site = [["Water", "H1"]]

[[node]]
type = "Select"
name = "COM"
Site = [["Water", "COM"]]

[[node]]
type = "IterateSelection"
Selection = "O"

[[node.ForEach]]
type = "IterateSelection"
Selection = "H"

[[node.ForEach.ForEach]]
type = "CalculateDistance"
name = "rOH"
I = "O"
J = "H"

[[node.ForEach.ForEach]]
type = "IterateSelection"
Selection = "COM"

[[node.ForEach.ForEach.ForEach]]
type = "CalculateAngle"
name = "HOH"
I = "H"
J = "O"
K = "COM"
"#,
            )
            .unwrap();
        let outputs = &procedure.state().outputs;
        let distance = outputs.observable("rOH").unwrap();
        assert!((distance - 0.96).abs() < 1e-9);
        let (m_o, m_h) = (atomic_mass("O").unwrap(), atomic_mass("H").unwrap());
        let total = m_o + 2.0 * m_h;
        let com = ((0.96 - 0.24) * m_h / total, 0.93 * m_h / total);
        let angle = outputs.observable("HOH").unwrap();
        assert!((angle - com.1.atan2(com.0).to_degrees()).abs() < 1e-9);
    }

    #[test]
    fn missing_current_site_is_a_state_error() {
        let mut harness = Harness::water(1);
        let err = harness
            .run_toml(
                r#"
context = "Analysis"

[[node]]
type = "Select"
name = "O"
Site = [["Water", "O"]]

[[node]]
type = "CalculateDistance"
I = "O"
J = "O"
"#,
            )
            .unwrap_err();
        assert!(matches!(err, ProcedureError::State { .. }));
    }
}
