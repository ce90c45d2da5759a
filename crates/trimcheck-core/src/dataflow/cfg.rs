//! Control-flow graph of abstract operations
//!
//! The host lowers a method body (from compiler operations or decoded IL)
//! into basic blocks of [`Statement`]s. The analysis only needs the shapes
//! below; anything it was not taught is expressed as [`Operand::Opaque`].

use crate::diagnostics::Location;
use crate::error::{AnalysisError, Result};
use crate::symbols::{FieldRef, GenericParamRef, MethodRef, TypeRef};
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;
use std::collections::HashSet;
use std::fmt;

/// Unique identifier for a basic block
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BlockId(pub usize);

impl BlockId {
    pub const ENTRY: BlockId = BlockId(0);
}

impl fmt::Display for BlockId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "B{}", self.0)
    }
}

/// A storage location whose value is tracked across the graph
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Slot {
    Local(u32),
    Parameter(u32),
    This,
}

/// A type supplied as a generic argument
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum TypeArgument {
    Named(TypeRef),
    Array(Box<TypeArgument>),
    GenericParameter(GenericParamRef),
    /// A constructed generic type; its own arguments are checked too
    Constructed(GenericInstantiation),
    /// Placeholder for an unbound definition, e.g. `typeof(List<>)`
    Error,
}

/// Type arguments supplied to a generic type or method definition
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenericInstantiation {
    pub definition: String,
    pub arguments: Vec<TypeArgument>,
}

impl GenericInstantiation {
    pub fn new(definition: impl Into<String>, arguments: Vec<TypeArgument>) -> Self {
        Self {
            definition: definition.into(),
            arguments,
        }
    }
}

/// A call whose arguments, receiver and type arguments are checked against
/// the callee's annotations
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Invocation {
    pub method: MethodRef,
    #[serde(default)]
    pub instance: Option<Operand>,
    #[serde(default)]
    pub arguments: SmallVec<[Operand; 4]>,
    #[serde(default)]
    pub type_arguments: Vec<TypeArgument>,
}

impl Invocation {
    pub fn new(method: impl Into<String>) -> Self {
        Self {
            method: MethodRef::new(method),
            instance: None,
            arguments: SmallVec::new(),
            type_arguments: Vec::new(),
        }
    }

    pub fn with_instance(mut self, instance: Operand) -> Self {
        self.instance = Some(instance);
        self
    }

    pub fn with_argument(mut self, argument: Operand) -> Self {
        self.arguments.push(argument);
        self
    }

    pub fn with_type_argument(mut self, argument: TypeArgument) -> Self {
        self.type_arguments.push(argument);
        self
    }
}

/// An expression producing a value
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Operand {
    /// `typeof(T)` for a named type
    TypeOf(TypeRef),
    /// `typeof(T)` for a generic type parameter
    GenericParameter(GenericParamRef),
    StringLiteral(String),
    Null,
    Read(Slot),
    LoadField(FieldRef),
    Invoke(Box<Invocation>),
    /// `operand.BaseType`
    BaseTypeOf(Box<Operand>),
    ArrayElement(Box<Operand>),
    /// `nameof(operand)`; the operand is never evaluated
    NameOf { text: String, operand: Box<Operand> },
    /// Any operation the analysis does not model; operands are still evaluated
    Opaque {
        description: String,
        #[serde(default)]
        operands: Vec<Operand>,
    },
}

impl Operand {
    pub fn type_of(name: impl Into<String>) -> Self {
        Operand::TypeOf(TypeRef::new(name))
    }

    pub fn string(text: impl Into<String>) -> Self {
        Operand::StringLiteral(text.into())
    }

    pub fn call(invocation: Invocation) -> Self {
        Operand::Invoke(Box::new(invocation))
    }

    pub fn base_type_of(operand: Operand) -> Self {
        Operand::BaseTypeOf(Box::new(operand))
    }
}

/// A single straight-line operation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Operation {
    Assign { slot: Slot, value: Operand },
    /// Expression statement, evaluated for its checked sub-operations
    Evaluate(Operand),
    StoreField { field: FieldRef, value: Operand },
    Return(Option<Operand>),
    /// A generic instantiation site such as `new Gen<T>()`
    Instantiate(GenericInstantiation),
    Throw(Option<Operand>),
    DefineLambda,
    DefineLocalFunction,
    Yield(Option<Operand>),
    Nop,
}

impl Operation {
    /// Operations that only appear in bodies the compiler rewrites into
    /// synthesized state machines or closures
    pub fn is_compiler_generated_marker(&self) -> bool {
        matches!(
            self,
            Operation::DefineLambda | Operation::DefineLocalFunction | Operation::Yield(_)
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Statement {
    pub operation: Operation,
    #[serde(default)]
    pub location: Location,
}

/// A basic block in the CFG
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BasicBlock {
    pub id: BlockId,
    #[serde(default)]
    pub statements: Vec<Statement>,
    #[serde(default)]
    pub predecessors: Vec<BlockId>,
    #[serde(default)]
    pub successors: Vec<BlockId>,
}

impl BasicBlock {
    pub fn new(id: BlockId) -> Self {
        Self {
            id,
            statements: Vec::new(),
            predecessors: Vec::new(),
            successors: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RegionKind {
    Catch,
    Finally,
}

/// A protected range and the handler entered when it throws
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExceptionRegion {
    pub kind: RegionKind,
    pub protected: Vec<BlockId>,
    pub handler: BlockId,
}

/// Control Flow Graph
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ControlFlowGraph {
    blocks: Vec<BasicBlock>,
    #[serde(default)]
    regions: Vec<ExceptionRegion>,
    #[serde(default = "entry_block")]
    entry: BlockId,
}

fn entry_block() -> BlockId {
    BlockId::ENTRY
}

impl ControlFlowGraph {
    pub fn entry(&self) -> BlockId {
        self.entry
    }

    pub fn block(&self, id: BlockId) -> Result<&BasicBlock> {
        self.blocks
            .get(id.0)
            .filter(|block| block.id == id)
            .ok_or(AnalysisError::UnknownBlock(id))
    }

    pub fn blocks(&self) -> impl Iterator<Item = &BasicBlock> {
        self.blocks.iter()
    }

    pub fn regions(&self) -> &[ExceptionRegion] {
        &self.regions
    }

    /// Handler entries of every region protecting `block`
    pub fn handlers_protecting(&self, block: BlockId) -> impl Iterator<Item = BlockId> + '_ {
        self.regions
            .iter()
            .filter(move |region| region.protected.contains(&block))
            .map(|region| region.handler)
    }

    pub fn statements(&self) -> impl Iterator<Item = &Statement> {
        self.blocks.iter().flat_map(|block| block.statements.iter())
    }

    /// Check every block reference resolves and both ends of every edge
    /// list it
    pub fn validate(&self) -> Result<()> {
        self.block(self.entry)?;
        for block in &self.blocks {
            self.block(block.id)?;
            for &succ in &block.successors {
                if !self.block(succ)?.predecessors.contains(&block.id) {
                    return Err(AnalysisError::UnmatchedEdge {
                        from: block.id,
                        to: succ,
                    });
                }
            }
            for &pred in &block.predecessors {
                if !self.block(pred)?.successors.contains(&block.id) {
                    return Err(AnalysisError::UnmatchedEdge {
                        from: pred,
                        to: block.id,
                    });
                }
            }
        }
        for region in &self.regions {
            self.block(region.handler)?;
            if region.protected.is_empty() {
                return Err(AnalysisError::EmptyProtectedRegion {
                    handler: region.handler,
                });
            }
            for &protected in &region.protected {
                self.block(protected)?;
            }
        }
        Ok(())
    }

    /// Blocks reachable from the entry, in reverse postorder
    ///
    /// A protected block counts its handlers as successors, so handlers are
    /// ordered after the blocks whose throwing points flow into them.
    pub fn reverse_postorder(&self) -> Vec<BlockId> {
        let mut postorder = self.postorder();
        postorder.reverse();
        postorder
    }

    pub fn postorder(&self) -> Vec<BlockId> {
        let mut visited = HashSet::new();
        let mut postorder = Vec::new();
        // Explicit stack of (block, outgoing edges, next edge) so long chains
        // cannot exhaust the thread stack
        let mut stack = vec![(self.entry, self.outgoing(self.entry), 0)];
        visited.insert(self.entry);

        while let Some((block, outgoing, next)) = stack.last_mut() {
            if let Some(&succ) = outgoing.get(*next) {
                *next += 1;
                if visited.insert(succ) {
                    let edges = self.outgoing(succ);
                    stack.push((succ, edges, 0));
                }
            } else {
                postorder.push(*block);
                stack.pop();
            }
        }
        postorder
    }

    /// Successors followed by the handlers protecting `block`
    fn outgoing(&self, block: BlockId) -> Vec<BlockId> {
        match self.block(block) {
            Ok(b) => b
                .successors
                .iter()
                .copied()
                .chain(self.handlers_protecting(block))
                .collect(),
            Err(_) => Vec::new(),
        }
    }
}

/// Builder for assembling a [`ControlFlowGraph`]
pub struct CfgBuilder {
    cfg: ControlFlowGraph,
}

impl CfgBuilder {
    pub fn new() -> Self {
        Self {
            cfg: ControlFlowGraph {
                blocks: vec![BasicBlock::new(BlockId::ENTRY)],
                regions: Vec::new(),
                entry: BlockId::ENTRY,
            },
        }
    }

    pub fn entry(&self) -> BlockId {
        self.cfg.entry
    }

    pub fn new_block(&mut self) -> BlockId {
        let id = BlockId(self.cfg.blocks.len());
        self.cfg.blocks.push(BasicBlock::new(id));
        id
    }

    pub fn add_edge(&mut self, from: BlockId, to: BlockId) -> &mut Self {
        if let Some(block) = self.cfg.blocks.get_mut(from.0) {
            if !block.successors.contains(&to) {
                block.successors.push(to);
            }
        }
        if let Some(block) = self.cfg.blocks.get_mut(to.0) {
            if !block.predecessors.contains(&from) {
                block.predecessors.push(from);
            }
        }
        self
    }

    pub fn push(&mut self, block: BlockId, operation: Operation, location: Location) -> &mut Self {
        if let Some(b) = self.cfg.blocks.get_mut(block.0) {
            b.statements.push(Statement { operation, location });
        }
        self
    }

    pub fn add_region(
        &mut self,
        kind: RegionKind,
        protected: impl IntoIterator<Item = BlockId>,
        handler: BlockId,
    ) -> &mut Self {
        self.cfg.regions.push(ExceptionRegion {
            kind,
            protected: protected.into_iter().collect(),
            handler,
        });
        self
    }

    pub fn build(self) -> Result<ControlFlowGraph> {
        self.cfg.validate()?;
        Ok(self.cfg)
    }
}

impl Default for CfgBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// One method body handed to the analysis
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisUnit {
    pub method: MethodRef,
    #[serde(default)]
    pub parameter_count: u32,
    #[serde(default)]
    pub has_this: bool,
    #[serde(default)]
    pub is_async: bool,
    pub body: ControlFlowGraph,
}

impl AnalysisUnit {
    pub fn new(method: impl Into<String>, body: ControlFlowGraph) -> Self {
        Self {
            method: MethodRef::new(method),
            parameter_count: 0,
            has_this: false,
            is_async: false,
            body,
        }
    }

    pub fn with_parameters(mut self, count: u32) -> Self {
        self.parameter_count = count;
        self
    }

    pub fn with_this(mut self) -> Self {
        self.has_this = true;
        self
    }

    pub fn asynchronous(mut self) -> Self {
        self.is_async = true;
        self
    }

    /// Whether the body contains code the compiler rewrites into closures or
    /// state machines
    pub fn has_compiler_generated_code(&self) -> bool {
        self.body
            .statements()
            .any(|statement| statement.operation.is_compiler_generated_marker())
    }
}
