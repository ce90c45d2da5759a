//! Single-pass forward dataflow over a method body
//!
//! Blocks are visited once, in reverse postorder. A block's entry state is
//! the meet of the exit states of predecessors already visited, so values
//! flowing along back edges are never seen: a loop that reassigns a slot
//! does not affect reads of that slot before the loop. Handler entry states
//! additionally merge the state at every program point of the blocks they
//! protect, since any of them may throw.

use super::cfg::{AnalysisUnit, BlockId, Invocation, Operand, Operation, Slot, Statement};
use super::classifier::ValueClassifier;
use super::lattice::SlotState;
use super::value::{LatticeValue, MultiValue};
use crate::diagnostics::{DiagnosticSink, Location};
use crate::enforcer::{CapabilityEnforcer, RequiredCapability};
use crate::error::{AnalysisError, Result};
use crate::generics::InstantiationChecker;
use crate::symbols::{SymbolModel, SymbolOrigin};
use std::collections::HashMap;
use tracing::trace;

type State = SlotState<LatticeValue>;

/// Slot states at block boundaries after a completed pass
#[derive(Debug, Default)]
pub struct DataflowResult {
    /// State on entry to each visited block
    pub in_states: HashMap<BlockId, State>,
    /// State on exit of each visited block
    pub out_states: HashMap<BlockId, State>,
}

/// Runs the analysis of one unit, reporting into a caller-owned sink
pub struct DataflowDriver<'a> {
    unit: &'a AnalysisUnit,
    symbols: &'a dyn SymbolModel,
    classifier: ValueClassifier<'a>,
    enforcer: &'a CapabilityEnforcer<'a>,
    instantiations: InstantiationChecker<'a>,
}

impl<'a> DataflowDriver<'a> {
    pub fn new(unit: &'a AnalysisUnit, symbols: &'a dyn SymbolModel, enforcer: &'a CapabilityEnforcer<'a>) -> Self {
        Self {
            unit,
            symbols,
            classifier: ValueClassifier::new(symbols),
            enforcer,
            instantiations: InstantiationChecker::new(symbols, enforcer),
        }
    }

    pub fn run(&self, sink: &mut DiagnosticSink) -> Result<DataflowResult> {
        let cfg = &self.unit.body;
        cfg.validate()?;

        let mut result = DataflowResult::default();
        let mut handler_inputs: HashMap<BlockId, State> = HashMap::new();

        for block_id in cfg.reverse_postorder() {
            let block = cfg.block(block_id)?;
            trace!(method = %self.unit.method, block = %block_id, "visiting block");

            let mut state = if block_id == cfg.entry() {
                self.initial_state()
            } else {
                State::new()
            };
            for pred in &block.predecessors {
                if let Some(exit) = result.out_states.get(pred) {
                    state.join_in_place(exit);
                }
            }
            if let Some(exceptional) = handler_inputs.get(&block_id) {
                state.join_in_place(exceptional);
            }
            result.in_states.insert(block_id, state.clone());

            let handlers: Vec<BlockId> = cfg.handlers_protecting(block_id).collect();
            record_throwing_point(&mut handler_inputs, &handlers, &state);
            for statement in &block.statements {
                self.transfer(statement, &mut state, sink)?;
                record_throwing_point(&mut handler_inputs, &handlers, &state);
            }

            result.out_states.insert(block_id, state);
        }

        Ok(result)
    }

    /// Parameters and `this` start out as their declared annotations
    fn initial_state(&self) -> State {
        let mut state = State::new();
        let method = &self.unit.method;
        for index in 0..self.unit.parameter_count {
            state.set(
                Slot::Parameter(index),
                MultiValue::singleton(self.classifier.parameter(method, index)),
            );
        }
        if self.unit.has_this {
            state.set(Slot::This, MultiValue::singleton(self.classifier.this_parameter(method)));
        }
        state
    }

    fn transfer(&self, statement: &Statement, state: &mut State, sink: &mut DiagnosticSink) -> Result<()> {
        let location = statement.location;
        match &statement.operation {
            Operation::Assign { slot, value } => {
                self.check_slot(*slot)?;
                let values = self.evaluate(value, state, location, sink)?;
                state.set(*slot, values);
            }
            Operation::Evaluate(operand) => {
                self.evaluate(operand, state, location, sink)?;
            }
            Operation::StoreField { field, value } => {
                let values = self.evaluate(value, state, location, sink)?;
                let requirement = RequiredCapability::new(
                    SymbolOrigin::Field { field: field.clone() },
                    self.symbols.field_capabilities(field),
                );
                self.enforcer.enforce(&values, &requirement, location, sink);
            }
            Operation::Return(Some(operand)) => {
                let values = self.evaluate(operand, state, location, sink)?;
                let method = &self.unit.method;
                let requirement = RequiredCapability::new(
                    SymbolOrigin::ReturnValue { method: method.clone() },
                    self.symbols.return_capabilities(method),
                );
                self.enforcer.enforce(&values, &requirement, location, sink);
            }
            Operation::Instantiate(instantiation) => {
                self.instantiations.check(instantiation, location, sink)?;
            }
            Operation::Throw(Some(operand)) | Operation::Yield(Some(operand)) => {
                self.evaluate(operand, state, location, sink)?;
            }
            Operation::Return(None)
            | Operation::Throw(None)
            | Operation::Yield(None)
            | Operation::DefineLambda
            | Operation::DefineLocalFunction
            | Operation::Nop => {}
        }
        Ok(())
    }

    fn evaluate(
        &self,
        operand: &Operand,
        state: &State,
        location: Location,
        sink: &mut DiagnosticSink,
    ) -> Result<MultiValue> {
        let values = match operand {
            Operand::TypeOf(ty) => MultiValue::singleton(self.classifier.type_of(ty)),
            Operand::GenericParameter(parameter) => MultiValue::singleton(self.classifier.generic_parameter(parameter)),
            Operand::StringLiteral(text) => MultiValue::singleton(LatticeValue::ConstantString(text.clone())),
            Operand::Null => MultiValue::singleton(LatticeValue::Null),
            Operand::Read(slot) => {
                self.check_slot(*slot)?;
                state.get(*slot)
            }
            Operand::LoadField(field) => MultiValue::singleton(self.classifier.field(field)),
            Operand::Invoke(invocation) => self.invoke(invocation, state, location, sink)?,
            Operand::BaseTypeOf(inner) => {
                let values = self.evaluate(inner, state, location, sink)?;
                self.classifier.base_type_of(&values)
            }
            Operand::ArrayElement(array) => {
                self.evaluate(array, state, location, sink)?;
                MultiValue::singleton(LatticeValue::Unknown)
            }
            // The operand of nameof is only named, never accessed
            Operand::NameOf { text, .. } => MultiValue::singleton(LatticeValue::ConstantString(text.clone())),
            Operand::Opaque { description, operands } => {
                trace!(description = %description, "unmodeled operation evaluates to unknown");
                for operand in operands {
                    self.evaluate(operand, state, location, sink)?;
                }
                MultiValue::singleton(LatticeValue::Unknown)
            }
        };
        Ok(values)
    }

    /// Check the receiver, arguments and type arguments of a call against
    /// the callee's annotations and produce its result
    fn invoke(
        &self,
        invocation: &Invocation,
        state: &State,
        location: Location,
        sink: &mut DiagnosticSink,
    ) -> Result<MultiValue> {
        let method = &invocation.method;

        if let Some(instance) = &invocation.instance {
            let values = self.evaluate(instance, state, location, sink)?;
            let requirement = RequiredCapability::new(
                SymbolOrigin::ThisParameter { method: method.clone() },
                self.symbols.this_capabilities(method),
            );
            self.enforcer.enforce(&values, &requirement, location, sink);
        }

        for (index, argument) in (0u32..).zip(&invocation.arguments) {
            let values = self.evaluate(argument, state, location, sink)?;
            let requirement = RequiredCapability::new(
                SymbolOrigin::Parameter {
                    method: method.clone(),
                    index,
                    name: self.symbols.parameter_name(method, index),
                },
                self.symbols.parameter_capabilities(method, index),
            );
            self.enforcer.enforce(&values, &requirement, location, sink);
        }

        if !invocation.type_arguments.is_empty() {
            self.instantiations
                .check_arguments(method.as_str(), &invocation.type_arguments, location, sink)?;
        }

        Ok(MultiValue::singleton(self.classifier.call_result(method)))
    }

    fn check_slot(&self, slot: Slot) -> Result<()> {
        match slot {
            Slot::Parameter(index) if index >= self.unit.parameter_count => Err(AnalysisError::ParameterOutOfRange {
                method: self.unit.method.to_string(),
                index,
                count: self.unit.parameter_count,
            }),
            Slot::This if !self.unit.has_this => Err(AnalysisError::NoThisParameter {
                method: self.unit.method.to_string(),
            }),
            _ => Ok(()),
        }
    }
}

fn record_throwing_point(handler_inputs: &mut HashMap<BlockId, State>, handlers: &[BlockId], state: &State) {
    for handler in handlers {
        handler_inputs
            .entry(*handler)
            .and_modify(|input| input.join_in_place(state))
            .or_insert_with(|| state.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataflow::cfg::{CfgBuilder, RegionKind};
    use crate::diagnostics::Diagnostic;
    use crate::table::SymbolTable;
    use trimcheck_annotations::CapabilityKind;

    fn sink_call(argument: Operand) -> Operation {
        Operation::Evaluate(Operand::call(Invocation::new("Sink.Require(Type)").with_argument(argument)))
    }

    fn table() -> SymbolTable {
        let mut table = SymbolTable::new();
        table
            .method("Sink.Require(Type)")
            .parameter("type", CapabilityKind::PUBLIC_METHODS);
        table.method("Src.Methods()").returns(CapabilityKind::PUBLIC_METHODS);
        table.method("Src.Fields()").returns(CapabilityKind::PUBLIC_FIELDS);
        table
    }

    fn call(method: &str) -> Operand {
        Operand::call(Invocation::new(method))
    }

    fn run(table: &SymbolTable, unit: &AnalysisUnit) -> Result<(DataflowResult, Vec<Diagnostic>)> {
        let enforcer = CapabilityEnforcer::new(table, table);
        let driver = DataflowDriver::new(unit, table, &enforcer);
        let mut sink = DiagnosticSink::new();
        let result = driver.run(&mut sink)?;
        Ok((result, sink.drain()))
    }

    #[test]
    fn test_assignment_replaces_previous_value() {
        let mut builder = CfgBuilder::new();
        let entry = builder.entry();
        let here = Location::new(1, 1);
        builder
            .push(entry, Operation::Assign { slot: Slot::Local(0), value: call("Src.Fields()") }, here)
            .push(entry, Operation::Assign { slot: Slot::Local(0), value: call("Src.Methods()") }, here)
            .push(entry, sink_call(Operand::Read(Slot::Local(0))), here);
        let unit = AnalysisUnit::new("C.M()", builder.build().unwrap());

        let (_, diagnostics) = run(&table(), &unit).unwrap();
        assert!(diagnostics.is_empty(), "unexpected diagnostics: {diagnostics:?}");
    }

    #[test]
    fn test_join_merges_predecessor_exits() {
        let mut builder = CfgBuilder::new();
        let entry = builder.entry();
        let left = builder.new_block();
        let right = builder.new_block();
        let merge = builder.new_block();
        let here = Location::default();
        builder
            .add_edge(entry, left)
            .add_edge(entry, right)
            .add_edge(left, merge)
            .add_edge(right, merge)
            .push(left, Operation::Assign { slot: Slot::Local(0), value: call("Src.Fields()") }, here)
            .push(right, Operation::Assign { slot: Slot::Local(0), value: call("Src.Methods()") }, here);
        let unit = AnalysisUnit::new("C.M()", builder.build().unwrap());

        let (result, _) = run(&table(), &unit).unwrap();
        assert_eq!(result.in_states[&merge].get(Slot::Local(0)).len(), 2);
        assert!(result.in_states[&left].get(Slot::Local(0)).is_empty());
    }

    #[test]
    fn test_parameters_start_annotated() {
        let mut table = table();
        table.method("C.M(Type)").parameter("t", CapabilityKind::PUBLIC_FIELDS);
        let unit = AnalysisUnit::new("C.M(Type)", CfgBuilder::new().build().unwrap())
            .with_parameters(1)
            .with_this();

        let (result, _) = run(&table, &unit).unwrap();
        let entry = &result.in_states[&BlockId::ENTRY];
        assert!(entry.get(Slot::Parameter(0)).iter().all(|value| matches!(
            value,
            LatticeValue::Annotated(a) if a.capabilities == CapabilityKind::PUBLIC_FIELDS
        )));
        assert_eq!(entry.get(Slot::This).len(), 1);
    }

    #[test]
    fn test_handler_sees_every_throwing_point() {
        let mut builder = CfgBuilder::new();
        let entry = builder.entry();
        let try_block = builder.new_block();
        let handler = builder.new_block();
        let exit = builder.new_block();
        let here = Location::default();
        builder
            .push(entry, Operation::Assign { slot: Slot::Local(0), value: call("Src.Fields()") }, here)
            .push(try_block, Operation::Assign { slot: Slot::Local(0), value: Operand::Null }, here)
            .push(try_block, Operation::Assign { slot: Slot::Local(0), value: call("Src.Methods()") }, here)
            .add_edge(entry, try_block)
            .add_edge(try_block, exit)
            .add_edge(handler, exit)
            .add_region(RegionKind::Catch, [try_block], handler);
        let unit = AnalysisUnit::new("C.M()", builder.build().unwrap());

        let (result, _) = run(&table(), &unit).unwrap();
        assert_eq!(result.in_states[&handler].get(Slot::Local(0)).len(), 3);
        assert_eq!(result.out_states[&try_block].get(Slot::Local(0)).len(), 1);
    }

    #[test]
    fn test_out_of_range_parameter_read_aborts() {
        let mut builder = CfgBuilder::new();
        let entry = builder.entry();
        builder.push(entry, sink_call(Operand::Read(Slot::Parameter(2))), Location::default());
        let unit = AnalysisUnit::new("C.M(Type)", builder.build().unwrap()).with_parameters(1);

        assert_eq!(
            run(&table(), &unit).unwrap_err(),
            AnalysisError::ParameterOutOfRange {
                method: "C.M(Type)".into(),
                index: 2,
                count: 1
            }
        );
    }

    #[test]
    fn test_this_in_static_method_aborts() {
        let mut builder = CfgBuilder::new();
        let entry = builder.entry();
        builder.push(entry, sink_call(Operand::Read(Slot::This)), Location::default());
        let unit = AnalysisUnit::new("C.Static()", builder.build().unwrap());

        assert!(matches!(
            run(&table(), &unit),
            Err(AnalysisError::NoThisParameter { .. })
        ));
    }

    #[test]
    fn test_opaque_operands_are_still_checked() {
        let mut builder = CfgBuilder::new();
        let entry = builder.entry();
        let nested = Operand::call(Invocation::new("Sink.Require(Type)").with_argument(call("Src.Fields()")));
        builder.push(
            entry,
            Operation::Evaluate(Operand::Opaque {
                description: "conditional".into(),
                operands: vec![nested],
            }),
            Location::new(4, 2),
        );
        let unit = AnalysisUnit::new("C.M()", builder.build().unwrap());

        let (_, diagnostics) = run(&table(), &unit).unwrap();
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(diagnostics[0].location(), Location::new(4, 2));
    }
}
