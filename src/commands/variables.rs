//! Variable opcodes: `mov`, `add`, `sub`, `mul`, `div`, `mod`, `inc`, `dec`
//!
//! All take `<var>,<operand>` (`inc`/`dec` take only the variable). The
//! operand is any condition-grammar operand: an integer, a quoted string,
//! another variable, or a parenthesised expression.

use super::{CommandTable, Completion, Finish};
use crate::interpreter::expr::{self, ExprError};
use crate::runtime::debug::{self, DebugCategory, DebugConfig, LogLevel};
use crate::types::{GameState, Value, VarRef, VariableError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Operation {
    Assign,
    Add,
    Subtract,
    Multiply,
    Divide,
    Modulo,
}

#[derive(Debug, thiserror::Error)]
pub enum AssignError {
    #[error("Expected '<var>,<operand>', got '{0}'")]
    Syntax(String),
    #[error("Unexpected trailing input '{0}'")]
    Trailing(String),
    #[error(transparent)]
    Variable(#[from] VariableError),
    #[error(transparent)]
    Expr(#[from] ExprError),
}

fn evaluate_operand(state: &GameState, src: &str) -> Result<Value, AssignError> {
    let (operand, rest) = expr::parse_condition(src)?;
    if !rest.is_empty() {
        return Err(AssignError::Trailing(rest.to_string()));
    }
    Ok(operand.eval(&|var| state.read_var(var))?)
}

fn combine(
    var: &VarRef,
    op: Operation,
    current: Value,
    operand: Value,
) -> Result<Value, AssignError> {
    match (op, current.as_int(), operand.as_int()) {
        (Operation::Assign, _, _) => Ok(operand),
        (Operation::Add, Some(a), Some(b)) => Ok(Value::Int(a.saturating_add(b))),
        // Adding to a string concatenates
        (Operation::Add, _, _) => Ok(Value::Str(format!("{current}{operand}"))),
        (Operation::Subtract, Some(a), Some(b)) => Ok(Value::Int(a.saturating_sub(b))),
        (Operation::Multiply, Some(a), Some(b)) => Ok(Value::Int(a.saturating_mul(b))),
        (Operation::Divide | Operation::Modulo, Some(_), Some(0)) => {
            Err(VariableError::DivisionByZero(var.to_string()).into())
        }
        (Operation::Divide, Some(a), Some(b)) => Ok(Value::Int(a.saturating_div(b))),
        (Operation::Modulo, Some(a), Some(b)) => Ok(Value::Int(a.wrapping_rem(b))),
        (_, None, _) => Err(VariableError::NotAnInteger {
            name: var.to_string(),
            value: current.to_string(),
        }
        .into()),
        (_, _, None) => Err(VariableError::NotAnInteger {
            name: var.to_string(),
            value: operand.to_string(),
        }
        .into()),
    }
}

fn apply(state: &GameState, arg: &str, op: Operation) -> Result<(VarRef, Value), AssignError> {
    let (target, operand) = arg
        .split_once(',')
        .ok_or_else(|| AssignError::Syntax(arg.to_string()))?;
    let var = VarRef::parse(target)?;
    let operand = evaluate_operand(state, operand)?;
    let value = combine(&var, op, state.read_var(&var), operand)?;
    state.write_var(&var, value.clone())?;
    Ok((var, value))
}

fn step(state: &GameState, arg: &str, delta: i64) -> Result<(VarRef, Value), AssignError> {
    let var = VarRef::parse(arg)?;
    let value = combine(&var, Operation::Add, state.read_var(&var), Value::Int(delta))?;
    state.write_var(&var, value.clone())?;
    Ok((var, value))
}

fn report(
    config: &DebugConfig,
    opcode: &str,
    arg: &str,
    result: Result<(VarRef, Value), AssignError>,
) {
    match result {
        Ok((var, value)) => debug::log(
            config,
            DebugCategory::Variables,
            LogLevel::Debug,
            &format!("[{opcode}] {var} = {value}"),
        ),
        Err(err) => log::error!("{opcode} {arg}: {err}"),
    }
}

pub fn commands(state: &GameState, config: &DebugConfig) -> CommandTable {
    let mut table = CommandTable::new();

    let binary = [
        ("mov", Operation::Assign),
        ("add", Operation::Add),
        ("sub", Operation::Subtract),
        ("mul", Operation::Multiply),
        ("div", Operation::Divide),
        ("mod", Operation::Modulo),
    ];
    for (opcode, op) in binary {
        let (st, cfg) = (state.clone(), config.clone());
        table.register(opcode, move |arg: &str, opcode: &str, _: Finish| {
            report(&cfg, opcode, arg, apply(&st, arg, op));
            Completion::Completed
        });
    }

    for (opcode, delta) in [("inc", 1), ("dec", -1)] {
        let (st, cfg) = (state.clone(), config.clone());
        table.register(opcode, move |arg: &str, opcode: &str, _: Finish| {
            report(&cfg, opcode, arg, step(&st, arg, delta));
            Completion::Completed
        });
    }

    table
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::Lookup;
    use crate::runtime::EventLoop;

    fn setup() -> (GameState, CommandTable) {
        let el = EventLoop::new();
        let state = GameState::new(&el);
        let table = commands(&state, &DebugConfig::default());
        (state, table)
    }

    fn run(table: &CommandTable, opcode: &str, arg: &str) {
        match table.lookup(opcode) {
            Lookup::Handler(handler) => {
                handler(arg, opcode, Finish::noop());
            }
            _ => panic!("{opcode} not registered"),
        }
    }

    fn get(state: &GameState, var: &str) -> Value {
        state.read_var(&VarRef::parse(var).unwrap())
    }

    #[test]
    fn mov_assigns_each_kind() {
        let (state, table) = setup();
        run(&table, "mov", "$x,5");
        run(&table, "mov", r#"$name,"Shiki""#);
        run(&table, "mov", "%flg3,1");
        run(&table, "mov", "%ark,%flg3");

        assert_eq!(get(&state, "$x"), Value::Int(5));
        assert_eq!(get(&state, "$name"), Value::from("Shiki"));
        assert!(state.progress().flags.contains("3"));
        assert_eq!(get(&state, "%ark"), Value::Int(1));
    }

    #[test]
    fn mov_replaces_values_of_any_kind() {
        let (state, table) = setup();
        run(&table, "mov", r#"$v,"text""#);
        run(&table, "mov", "$v,3");
        assert_eq!(get(&state, "$v"), Value::Int(3));
        run(&table, "mov", r#"$v,"again""#);
        assert_eq!(get(&state, "$v"), Value::from("again"));
    }

    #[test]
    fn arithmetic_updates_counters() {
        let (state, table) = setup();
        run(&table, "mov", "%ciel,10");
        run(&table, "add", "%ciel,5");
        run(&table, "sub", "%ciel,3");
        run(&table, "mul", "%ciel,2");
        run(&table, "div", "%ciel,5");
        run(&table, "inc", "%ciel");
        assert_eq!(get(&state, "%ciel"), Value::Int(5));

        run(&table, "mod", "%ciel,3");
        run(&table, "dec", "%ciel");
        assert_eq!(get(&state, "%ciel"), Value::Int(1));
    }

    #[test]
    fn add_concatenates_strings() {
        let (state, table) = setup();
        run(&table, "mov", r#"$s,"ab""#);
        run(&table, "add", r#"$s,"cd""#);
        assert_eq!(get(&state, "$s"), Value::from("abcd"));
    }

    #[test]
    fn bad_input_is_reported_not_applied() {
        let (state, table) = setup();
        run(&table, "mov", "%c,7");
        run(&table, "div", "%c,0");
        run(&table, "mov", "nonsense");
        run(&table, "mov", "%c,1 2");
        run(&table, "mov", r#"%c,"text""#);
        assert_eq!(get(&state, "%c"), Value::Int(7));
    }
}
