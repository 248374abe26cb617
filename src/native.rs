// ABOUTME: Host-provided native callables exposed to Lox programs as globals

use crate::error::RuntimeError;
use crate::interpreter::Interpreter;
use crate::value::{Native, Value};
use std::time::{SystemTime, UNIX_EPOCH};

/// `clock()` — milliseconds elapsed since the Unix epoch, as a float.
pub struct Clock;

impl Native for Clock {
    fn name(&self) -> &str {
        "clock"
    }

    fn arity(&self) -> usize {
        0
    }

    fn call(&self, _interpreter: &mut Interpreter, _args: Vec<Value>) -> Result<Value, RuntimeError> {
        let elapsed = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map_err(|_| RuntimeError::new(0, "System clock is set before the Unix epoch."))?;
        Ok(Value::Number(elapsed.as_millis() as f64))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::env::Environment;
    use crate::interpreter::stdout_sink;
    use std::collections::HashMap;

    #[test]
    fn clock_returns_a_nonnegative_number() {
        let globals = Environment::new();
        let mut interpreter = Interpreter::new(globals, HashMap::new(), stdout_sink());
        let result = Clock.call(&mut interpreter, vec![]).unwrap();
        match result {
            Value::Number(n) => assert!(n > 0.0),
            other => panic!("expected a number, got {other:?}"),
        }
    }
}
