use alloc::string::String;
use alloc::vec::Vec;
use core::fmt::{Debug, Formatter};

/// The definitions being processed, outermost first.
///
/// Attached to error messages so a failure deep inside nested containers
/// can be traced back to the root field.
#[derive(Default, Clone)]
pub(crate) struct DefinitionStack {
    stack: Vec<String>,
}

impl DefinitionStack {
    pub const fn new() -> Self {
        Self { stack: Vec::new() }
    }

    pub fn push(&mut self, definition: &str) {
        self.stack.push(definition.into());
    }

    pub fn pop(&mut self) {
        self.stack.pop();
    }

    pub fn is_empty(&self) -> bool {
        self.stack.is_empty()
    }
}

impl Debug for DefinitionStack {
    fn fmt(&self, f: &mut Formatter<'_>) -> core::fmt::Result {
        let mut iter = self.stack.iter();

        if let Some(first) = iter.next() {
            writeln!(f, "`{first}`")?;
        }

        for definition in iter {
            writeln!(f, " -> `{definition}`")?;
        }

        Ok(())
    }
}
