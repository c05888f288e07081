//! The types a definition needs before it can be written or read.

use alloc::string::{String, ToString};
use alloc::vec;
use alloc::vec::Vec;

use vc_reflect::shape::DefinitionShape;
use vc_reflect::ReflectionType;
use vc_utils::hash::HashSet;

use crate::custom::CustomTypeHandler;
use crate::definition::TypeSource;

/// Every aggregate reachable from a root definition.
pub(crate) struct Dependencies<'a> {
    /// Reachable aggregates, the root first.
    pub types: Vec<&'a ReflectionType>,
    /// Names nothing is registered under.
    pub missing: Vec<String>,
}

/// Walks the definitions reachable from `root` through fields, container
/// elements and pointees.
pub(crate) fn collect<'a>(source: &'a dyn TypeSource, root: &str) -> Dependencies<'a> {
    let mut dependencies = Dependencies {
        types: Vec::new(),
        missing: Vec::new(),
    };
    let mut visited: HashSet<String> = HashSet::default();
    let mut pending: Vec<String> = vec![root.trim().to_string()];

    while let Some(definition) = pending.pop() {
        if !visited.insert(definition.clone()) {
            continue;
        }
        if let Some(handler) = CustomTypeHandler::find(&definition) {
            pending.extend(handler.dependencies(&definition).into_iter().map(|d| d.trim().to_string()));
            continue;
        }
        match DefinitionShape::parse(&definition) {
            DefinitionShape::Basic(_) | DefinitionShape::BasicArray { .. } => {}
            DefinitionShape::Pointer(pointee) => pending.push(pointee.trim().to_string()),
            DefinitionShape::Named(name) => match source.try_get_type(name) {
                Some(ty) => {
                    dependencies.types.push(ty);
                    // Reversed so fields are visited in declaration order.
                    pending.extend(ty.fields.iter().rev().map(|field| field.definition.trim().to_string()));
                }
                None => dependencies.missing.push(name.to_string()),
            },
            DefinitionShape::Template { .. } => dependencies.missing.push(definition),
        }
    }
    dependencies
}

/// The names `type_name` depends on that `source` does not know.
///
/// # Examples
///
/// ```
/// use vc_reflect::registry::{TypeDescriptor, TypeRegistry};
/// use vc_serialize::custom::CustomTypes;
/// use vc_serialize::missing_dependent_types;
///
/// let mut registry = TypeRegistry::new();
/// registry.add(TypeDescriptor::new("Scene").field("meshes", "Stream<Mesh*>"));
/// registry.resolve(&CustomTypes).unwrap();
///
/// assert_eq!(missing_dependent_types(&registry, "Scene"), ["Mesh"]);
/// ```
pub fn missing_dependent_types(source: &dyn TypeSource, type_name: &str) -> Vec<String> {
    collect(source, type_name).missing
}

#[cfg(test)]
mod tests {
    use vc_reflect::registry::{TypeDescriptor, TypeRegistry};

    use super::collect;
    use crate::custom::CustomTypes;

    #[test]
    fn reaches_through_containers_and_pointers() {
        let mut registry = TypeRegistry::new();
        registry.add(
            TypeDescriptor::new("World")
                .field("entities", "SparseSet<Entity>")
                .field("lookup", "HashTable<Entity*, uint32>")
                .field("shared", "ReferenceCounted<Settings>"),
        );
        registry.add(TypeDescriptor::new("Entity").field("id", "uint32").field("parent", "Entity*"));
        registry.add(TypeDescriptor::new("Settings").field("scale", "float"));
        registry.resolve(&CustomTypes).unwrap();

        let dependencies = collect(&registry, "World");
        let names: alloc::vec::Vec<&str> = dependencies.types.iter().map(|ty| ty.name.as_str()).collect();
        assert_eq!(names, ["World", "Entity", "Settings"]);
        assert!(dependencies.missing.is_empty());

        assert_eq!(collect(&registry, "Nothing").missing, ["Nothing"]);
    }
}
