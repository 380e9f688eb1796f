use super::context::NodeContext;
use super::node::NodeKind;
use super::nodes::{
    add::Add, calculate::Calculate, collect::Collect, configuration::BoxNode,
    configuration::SizeFactorNode, configuration::TemperatureNode, copy::CopyNode,
    import::ImportCoordinates, iterate::IterateSelection, module::RunModule, operate::Operate,
    parameters::Parameters, pick::Pick, pick::PickProximity, pick::PickRegion, process::Process,
    region::CustomRegion, region::GeneralRegion, remove::Remove, select::Select,
};
use phf::phf_map;
use std::fmt;

/// Every node type the engine knows, identified by its persisted type tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeType {
    Parameters,
    Box,
    Temperature,
    SizeFactor,
    ImportCoordinates,
    Copy,
    Add,
    Remove,
    Select,
    IterateSelection,
    Pick,
    PickProximity,
    PickRegion,
    GeneralRegion,
    CustomRegion,
    CalculateDistance,
    CalculateAngle,
    Collect1D,
    Collect2D,
    Collect3D,
    Process1D,
    Process2D,
    Process3D,
    OperateDivide,
    OperateMultiply,
    OperateExpression,
    OperateSitePopulationNormalise,
    OperateNumberDensityNormalise,
    OperateSphericalShellNormalise,
    RunModule,
}

static NODE_TYPES: phf::Map<&'static str, NodeType> = phf_map! {
    "Parameters" => NodeType::Parameters,
    "Box" => NodeType::Box,
    "Temperature" => NodeType::Temperature,
    "SizeFactor" => NodeType::SizeFactor,
    "ImportCoordinates" => NodeType::ImportCoordinates,
    "Copy" => NodeType::Copy,
    "Add" => NodeType::Add,
    "Remove" => NodeType::Remove,
    "Select" => NodeType::Select,
    "IterateSelection" => NodeType::IterateSelection,
    "Pick" => NodeType::Pick,
    "PickProximity" => NodeType::PickProximity,
    "PickRegion" => NodeType::PickRegion,
    "GeneralRegion" => NodeType::GeneralRegion,
    "CustomRegion" => NodeType::CustomRegion,
    "CalculateDistance" => NodeType::CalculateDistance,
    "CalculateAngle" => NodeType::CalculateAngle,
    "Collect1D" => NodeType::Collect1D,
    "Collect2D" => NodeType::Collect2D,
    "Collect3D" => NodeType::Collect3D,
    "Process1D" => NodeType::Process1D,
    "Process2D" => NodeType::Process2D,
    "Process3D" => NodeType::Process3D,
    "OperateDivide" => NodeType::OperateDivide,
    "OperateMultiply" => NodeType::OperateMultiply,
    "OperateExpression" => NodeType::OperateExpression,
    "OperateSitePopulationNormalise" => NodeType::OperateSitePopulationNormalise,
    "OperateNumberDensityNormalise" => NodeType::OperateNumberDensityNormalise,
    "OperateSphericalShellNormalise" => NodeType::OperateSphericalShellNormalise,
    "RunModule" => NodeType::RunModule,
};

const GENERATION: &[NodeContext] = &[NodeContext::Generation];
const ANALYSIS: &[NodeContext] = &[NodeContext::Analysis];
const OPERATE: &[NodeContext] = &[NodeContext::Operate];
const CONTROL: &[NodeContext] = &[NodeContext::Control];
const SELECTION: &[NodeContext] = &[NodeContext::Generation, NodeContext::Analysis];
const PARAMETERS: &[NodeContext] = &[
    NodeContext::Generation,
    NodeContext::Analysis,
    NodeContext::Control,
];

impl NodeType {
    /// Resolves a persisted type tag.
    pub fn from_tag(tag: &str) -> Option<Self> {
        NODE_TYPES.get(tag).copied()
    }

    pub fn all() -> impl Iterator<Item = NodeType> {
        NODE_TYPES.values().copied()
    }

    pub fn tag(self) -> &'static str {
        match self {
            Self::Parameters => "Parameters",
            Self::Box => "Box",
            Self::Temperature => "Temperature",
            Self::SizeFactor => "SizeFactor",
            Self::ImportCoordinates => "ImportCoordinates",
            Self::Copy => "Copy",
            Self::Add => "Add",
            Self::Remove => "Remove",
            Self::Select => "Select",
            Self::IterateSelection => "IterateSelection",
            Self::Pick => "Pick",
            Self::PickProximity => "PickProximity",
            Self::PickRegion => "PickRegion",
            Self::GeneralRegion => "GeneralRegion",
            Self::CustomRegion => "CustomRegion",
            Self::CalculateDistance => "CalculateDistance",
            Self::CalculateAngle => "CalculateAngle",
            Self::Collect1D => "Collect1D",
            Self::Collect2D => "Collect2D",
            Self::Collect3D => "Collect3D",
            Self::Process1D => "Process1D",
            Self::Process2D => "Process2D",
            Self::Process3D => "Process3D",
            Self::OperateDivide => "OperateDivide",
            Self::OperateMultiply => "OperateMultiply",
            Self::OperateExpression => "OperateExpression",
            Self::OperateSitePopulationNormalise => "OperateSitePopulationNormalise",
            Self::OperateNumberDensityNormalise => "OperateNumberDensityNormalise",
            Self::OperateSphericalShellNormalise => "OperateSphericalShellNormalise",
            Self::RunModule => "RunModule",
        }
    }

    pub fn allowed_contexts(self) -> &'static [NodeContext] {
        match self {
            Self::Parameters => PARAMETERS,
            Self::Select | Self::IterateSelection => SELECTION,
            Self::CalculateDistance
            | Self::CalculateAngle
            | Self::Collect1D
            | Self::Collect2D
            | Self::Collect3D
            | Self::Process1D
            | Self::Process2D
            | Self::Process3D => ANALYSIS,
            Self::OperateDivide
            | Self::OperateMultiply
            | Self::OperateExpression
            | Self::OperateSitePopulationNormalise
            | Self::OperateNumberDensityNormalise
            | Self::OperateSphericalShellNormalise => OPERATE,
            Self::RunModule => CONTROL,
            _ => GENERATION,
        }
    }

    pub fn accepts(self, context: NodeContext) -> bool {
        self.allowed_contexts().contains(&context)
    }

    /// The keyword under which the node's branch is persisted, for types that own one.
    pub fn branch_keyword(self) -> Option<&'static str> {
        match self {
            Self::IterateSelection => Some("ForEach"),
            Self::Collect1D | Self::Collect2D | Self::Collect3D => Some("SubCollect"),
            Self::Process1D | Self::Process2D | Self::Process3D => Some("Normalisation"),
            _ => None,
        }
    }

    /// Context of the branch owned by a node of this type placed in `parent`.
    pub fn branch_context(self, parent: NodeContext) -> NodeContext {
        match self {
            Self::Process1D | Self::Process2D | Self::Process3D => NodeContext::Operate,
            _ => parent,
        }
    }

    /// Builds a node of this type with default keywords.
    pub fn create(self) -> Box<dyn NodeKind> {
        match self {
            Self::Parameters => Box::new(Parameters::new()),
            Self::Box => Box::new(BoxNode::new()),
            Self::Temperature => Box::new(TemperatureNode::new()),
            Self::SizeFactor => Box::new(SizeFactorNode::new()),
            Self::ImportCoordinates => Box::new(ImportCoordinates::new()),
            Self::Copy => Box::new(CopyNode::new()),
            Self::Add => Box::new(Add::new()),
            Self::Remove => Box::new(Remove::new()),
            Self::Select => Box::new(Select::new()),
            Self::IterateSelection => Box::new(IterateSelection::new()),
            Self::Pick => Box::new(Pick::new()),
            Self::PickProximity => Box::new(PickProximity::new()),
            Self::PickRegion => Box::new(PickRegion::new()),
            Self::GeneralRegion => Box::new(GeneralRegion::new()),
            Self::CustomRegion => Box::new(CustomRegion::new()),
            Self::CalculateDistance => Box::new(Calculate::distance()),
            Self::CalculateAngle => Box::new(Calculate::angle()),
            Self::Collect1D => Box::new(Collect::new(1)),
            Self::Collect2D => Box::new(Collect::new(2)),
            Self::Collect3D => Box::new(Collect::new(3)),
            Self::Process1D => Box::new(Process::new(1)),
            Self::Process2D => Box::new(Process::new(2)),
            Self::Process3D => Box::new(Process::new(3)),
            Self::OperateDivide
            | Self::OperateMultiply
            | Self::OperateExpression
            | Self::OperateSitePopulationNormalise
            | Self::OperateNumberDensityNormalise
            | Self::OperateSphericalShellNormalise => Box::new(Operate::new(self)),
            Self::RunModule => Box::new(RunModule::new()),
        }
    }
}

impl fmt::Display for NodeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}
