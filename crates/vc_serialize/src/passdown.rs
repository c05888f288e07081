//! Caller context handed down to custom type handlers.
//!
//! Handlers own no state. Whatever they need beyond the value being written
//! or read travels in the [`Passdown`] of the current call.

use alloc::string::{String, ToString};

use vc_reflect::Value;
use vc_utils::hash::HashMap;

use crate::custom::CustomTypeHandler;

// -----------------------------------------------------------------------------
// AssetResolver

/// The asset families a material refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AssetKind {
    Shader,
    Texture,
    Sampler,
}

/// Translates asset handles, which only mean something inside one asset
/// database, to stable names and back.
pub trait AssetResolver {
    fn asset_name(&self, kind: AssetKind, handle: u32) -> Option<String>;

    fn asset_handle(&self, kind: AssetKind, name: &str) -> Option<u32>;
}

// -----------------------------------------------------------------------------
// Passdown

/// A container registered under a reference key.
#[derive(Debug, Clone)]
struct ReferenceContainer {
    handler: CustomTypeHandler,
    value: Value,
}

/// Context of one serialize or deserialize call.
///
/// Containers tagged `ReferenceKey:<key>` are registered as they are written
/// or read. Pointers tagged `Reference:<key>` are then encoded as a token
/// into that container instead of a copy of their pointee.
#[derive(Default)]
pub struct Passdown<'a> {
    asset_resolver: Option<&'a dyn AssetResolver>,
    references: HashMap<String, ReferenceContainer>,
}

impl<'a> Passdown<'a> {
    pub fn new(asset_resolver: Option<&'a dyn AssetResolver>) -> Self {
        Self {
            asset_resolver,
            references: HashMap::default(),
        }
    }

    #[inline]
    pub fn asset_resolver(&self) -> Option<&'a dyn AssetResolver> {
        self.asset_resolver
    }

    /// Registers `value` as the container behind `key`, replacing any
    /// earlier one.
    pub fn register(&mut self, key: &str, handler: CustomTypeHandler, value: Value) {
        log::trace!("registering reference container `{key}`");
        self.references
            .insert(key.to_string(), ReferenceContainer { handler, value });
    }

    #[inline]
    pub fn contains(&self, key: &str) -> bool {
        self.references.contains_key(key)
    }

    /// The token of `element` inside the container behind `key`.
    pub fn find_token(&self, key: &str, element: &Value) -> Result<u32, &'static str> {
        let container = self
            .references
            .get(key)
            .ok_or("no container is registered under this key")?;
        container
            .handler
            .find_element(&container.value, element)
            .ok_or("the element is not in the container")
    }

    /// The element behind `token` inside the container behind `key`.
    pub fn element(&self, key: &str, token: u32) -> Option<&Value> {
        let container = self.references.get(key)?;
        container.handler.get_element(&container.value, token)
    }
}

#[cfg(test)]
mod tests {
    use vc_reflect::Value;
    use vc_reflect::value::SparseSetValue;

    use super::Passdown;
    use crate::custom::CustomTypeHandler;

    #[test]
    fn tokens_are_handles() {
        let mut set = SparseSetValue::new();
        let first = set.add(Value::U32(10));
        let second = set.add(Value::U32(20));
        set.remove(first);

        let mut passdown = Passdown::new(None);
        passdown.register("ids", CustomTypeHandler::SparseSet, Value::SparseSet(set));

        assert_eq!(passdown.find_token("ids", &Value::U32(20)), Ok(second));
        assert_eq!(passdown.element("ids", second), Some(&Value::U32(20)));
        assert!(passdown.find_token("ids", &Value::U32(10)).is_err());
        assert!(passdown.find_token("other", &Value::U32(20)).is_err());
    }
}
