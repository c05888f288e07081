//! Parsing of field definition strings.
//!
//! A definition is the source spelling of a field's type, e.g. `float3`,
//! `int[4]`, `char*`, `HashTable<Material, uint32>` or `Transform`.

use alloc::vec::Vec;

use crate::basic::BasicType;

// -----------------------------------------------------------------------------
// DefinitionShape

/// The syntactic form of a definition string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DefinitionShape<'a> {
    /// A basic type, `float3`.
    Basic(BasicType),
    /// A fixed array of a basic type, `int[4]`.
    BasicArray { element: BasicType, count: usize },
    /// A pointer, carrying the pointee definition.
    Pointer(&'a str),
    /// A template instantiation, `Stream<Foo>`.
    Template {
        name: &'a str,
        arguments: Vec<&'a str>,
    },
    /// Anything else: the name of an aggregate or of a non-template custom type.
    Named(&'a str),
}

impl<'a> DefinitionShape<'a> {
    /// Parses a definition string.
    ///
    /// # Examples
    ///
    /// ```
    /// use vc_reflect::shape::DefinitionShape;
    /// use vc_reflect::BasicType;
    ///
    /// assert_eq!(
    ///     DefinitionShape::parse("int[4]"),
    ///     DefinitionShape::BasicArray { element: BasicType::Int32, count: 4 },
    /// );
    /// assert_eq!(DefinitionShape::parse("char *"), DefinitionShape::Pointer("char"));
    /// assert_eq!(
    ///     DefinitionShape::parse("HashTable<Foo, Stream<int>>"),
    ///     DefinitionShape::Template { name: "HashTable", arguments: vec!["Foo", "Stream<int>"] },
    /// );
    /// ```
    pub fn parse(definition: &'a str) -> Self {
        let definition = definition.trim();

        if let Some(pointee) = definition.strip_suffix('*') {
            return Self::Pointer(pointee.trim());
        }

        if let Some((name, arguments)) = split_template(definition) {
            return Self::Template { name, arguments };
        }

        if let Some(open) = definition.find('[')
            && let Some(inner) = definition[open + 1..].strip_suffix(']')
            && let Ok(count) = inner.trim().parse::<usize>()
            && let Some(element) = BasicType::from_name(definition[..open].trim())
        {
            return Self::BasicArray { element, count };
        }

        match BasicType::from_name(definition) {
            Some(basic) => Self::Basic(basic),
            None => Self::Named(definition),
        }
    }
}

/// Splits `Name<A, B<C, D>>` into `("Name", ["A", "B<C, D>"])`.
///
/// Returns `None` when the definition is not a template.
pub fn split_template(definition: &str) -> Option<(&str, Vec<&str>)> {
    let definition = definition.trim();
    let open = definition.find('<')?;
    let inner = definition.strip_suffix('>')?.get(open + 1..)?;

    let mut arguments = Vec::new();
    let mut depth = 0_usize;
    let mut start = 0;
    for (index, byte) in inner.bytes().enumerate() {
        match byte {
            b'<' => depth += 1,
            b'>' => depth = depth.checked_sub(1)?,
            b',' if depth == 0 => {
                arguments.push(inner[start..index].trim());
                start = index + 1;
            }
            _ => {}
        }
    }
    if depth != 0 {
        return None;
    }
    let last = inner[start..].trim();
    if !last.is_empty() {
        arguments.push(last);
    }

    Some((definition[..open].trim(), arguments))
}
