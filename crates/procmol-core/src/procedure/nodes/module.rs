use super::optional_text;
use crate::procedure::error::ProcedureError;
use crate::procedure::keywords::{KeywordError, KeywordValue};
use crate::procedure::node::{NodeEnv, NodeKind};
use crate::procedure::registry::NodeType;
use tracing::info;

/// Hands the configuration to a named module of the host application.
#[derive(Debug, Default)]
pub struct RunModule {
    module: Option<String>,
}

impl RunModule {
    pub fn new() -> Self {
        Self::default()
    }
}

impl NodeKind for RunModule {
    fn node_type(&self) -> NodeType {
        NodeType::RunModule
    }

    fn keywords(&self) -> Vec<(&'static str, KeywordValue)> {
        self.module
            .iter()
            .map(|m| ("Module", KeywordValue::text(m)))
            .collect()
    }

    fn set_keyword(&mut self, keyword: &str, value: &KeywordValue) -> Result<(), KeywordError> {
        match keyword {
            "Module" => self.module = optional_text(value)?,
            _ => return Err(KeywordError::Unknown),
        }
        Ok(())
    }

    fn prepare(&mut self, env: &mut NodeEnv<'_, '_>) -> Result<(), ProcedureError> {
        let module = self
            .module
            .as_deref()
            .ok_or_else(|| env.fail("no module was given"))?;
        match env.ctx.modules.as_deref() {
            None => Err(env.fail("no module host is available")),
            Some(host) if !host.has_module(module) => {
                Err(env.fail(format!("module '{module}' does not exist")))
            }
            Some(_) => Ok(()),
        }
    }

    fn execute(&mut self, env: &mut NodeEnv<'_, '_>) -> Result<(), ProcedureError> {
        let module = self.module.as_deref().unwrap_or_default();
        let ctx = &mut *env.ctx;
        let Some(host) = ctx.modules.as_deref_mut() else {
            return Err(ProcedureError::state(env.name, "no module host is available"));
        };
        info!(node = env.name, module, "Running module");
        host.run_module(module, ctx.configuration)
            .map_err(|message| ProcedureError::state(env.name, format!("module '{module}' failed: {message}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::models::configuration::Configuration;
    use crate::procedure::context::{ModuleHost, NodeContext};
    use crate::procedure::node::Node;
    use crate::procedure::root::Procedure;
    use crate::procedure::sequence::Sequence;
    use crate::procedure::testing::Harness;

    #[derive(Default)]
    struct Recorder {
        runs: Vec<String>,
    }

    impl ModuleHost for Recorder {
        fn has_module(&self, name: &str) -> bool {
            name == "Energy" || name == "Broken"
        }

        fn run_module(&mut self, name: &str, configuration: &mut Configuration) -> Result<(), String> {
            if name == "Broken" {
                return Err("diverged".to_string());
            }
            configuration.set_temperature(42.0);
            self.runs.push(name.to_string());
            Ok(())
        }
    }

    fn control(module: &str) -> Procedure {
        let node = Node::new(NodeType::RunModule)
            .with("Module", KeywordValue::text(module))
            .unwrap();
        Procedure::from_sequence(NodeContext::Control, Sequence::new().with(node)).unwrap()
    }

    #[test]
    fn delegates_to_the_host() {
        let mut harness = Harness::new();
        let mut host = Recorder::default();
        let mut procedure = control("Energy");
        {
            let mut ctx = harness.ctx().with_modules(&mut host);
            procedure.prepare(&mut ctx).unwrap();
            procedure.execute(&mut ctx).unwrap();
            procedure.execute(&mut ctx).unwrap();
        }
        assert_eq!(host.runs, vec!["Energy", "Energy"]);
        assert_eq!(harness.configuration.temperature(), 42.0);
    }

    #[test]
    fn unknown_module_fails_at_prepare() {
        let mut harness = Harness::new();
        let mut host = Recorder::default();
        let mut procedure = control("Missing");
        let mut ctx = harness.ctx().with_modules(&mut host);
        assert!(matches!(
            procedure.prepare(&mut ctx),
            Err(ProcedureError::State { .. })
        ));
    }

    #[test]
    fn module_failure_is_reported() {
        let mut harness = Harness::new();
        let mut host = Recorder::default();
        let mut procedure = control("Broken");
        let mut ctx = harness.ctx().with_modules(&mut host);
        procedure.prepare(&mut ctx).unwrap();
        let err = procedure.execute(&mut ctx).unwrap_err();
        assert!(err.to_string().contains("diverged"), "{err}");
    }

    #[test]
    fn missing_host_fails_at_prepare() {
        let mut harness = Harness::new();
        let mut procedure = control("Energy");
        assert!(procedure.prepare(&mut harness.ctx()).is_err());
    }
}
