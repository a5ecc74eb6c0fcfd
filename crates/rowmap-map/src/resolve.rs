//! Column name to property path resolution.
//!
//! A column name is matched against the target tree segment by segment.
//! Each segment is tried as an exact property name, then case-insensitively
//! when configured, then as an indexed list element (`tags[0]`, `tags_0`,
//! `tags0`), then as the singular of a list property (`tag` for `tags`).
//! Nested paths split on the configured separator first and on `_` second.

use std::fmt;
use std::sync::Arc;

use rowmap_model::{Binding, CaseSensitivity, MapperConfig, TypeMeta, ValueType};

/// One step from an object into one of its properties.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PathStep {
    /// A scalar or a nested single object.
    Property(usize),
    /// An element of a list property. `index: None` is the collection
    /// itself, assembled from consecutive rows; `Some(n)` is element `n`
    /// of a list filled within one row.
    Element { property: usize, index: Option<usize> },
}

impl PathStep {
    pub fn property(self) -> usize {
        match self {
            Self::Property(property) | Self::Element { property, .. } => property,
        }
    }

    pub fn is_collection(self) -> bool {
        matches!(self, Self::Element { index: None, .. })
    }
}

/// Resolved path of one column into the target tree.
#[derive(Debug, Clone, PartialEq)]
pub struct PropertyPath {
    steps: Vec<PathStep>,
    /// Property name per step; indexed steps carry `[n]`.
    names: Vec<String>,
    /// Type of the value the column's cell becomes.
    leaf: ValueType,
    /// How the last property receives its value on its owner.
    binding: Binding,
}

impl PropertyPath {
    pub fn steps(&self) -> &[PathStep] {
        &self.steps
    }

    pub fn leaf_type(&self) -> &ValueType {
        &self.leaf
    }

    pub fn binding(&self) -> Binding {
        self.binding
    }

    /// Dotted names of the first `len` steps.
    pub fn prefix(&self, len: usize) -> String {
        self.names[..len.min(self.names.len())].join(".")
    }

    /// Dotted property names, e.g. `orders.items.sku`.
    pub fn as_str(&self) -> String {
        self.prefix(self.names.len())
    }
}

impl fmt::Display for PropertyPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.as_str())
    }
}

#[derive(Debug, Clone, Copy)]
struct Segment {
    property: usize,
    index: Option<usize>,
    /// Resolved through the singular form of a list name.
    singular: bool,
}

/// Resolves column names against one root type.
#[derive(Debug, Clone)]
pub struct PathResolver {
    root: Arc<TypeMeta>,
    case: CaseSensitivity,
    separator: char,
}

impl PathResolver {
    pub fn new(root: Arc<TypeMeta>, config: &MapperConfig) -> Self {
        Self {
            root,
            case: config.case_sensitivity,
            separator: config.path_separator,
        }
    }

    pub fn root(&self) -> &Arc<TypeMeta> {
        &self.root
    }

    /// Resolves `name`; `None` when the column maps to nothing.
    pub fn resolve(&self, name: &str) -> Option<PropertyPath> {
        let mut steps = Vec::new();
        let mut names = Vec::new();
        let mut binding = Binding::Setter;
        let leaf =
            self.resolve_in(&self.root, name.trim(), &mut steps, &mut names, &mut binding)?;
        Some(PropertyPath {
            steps,
            names,
            leaf,
            binding,
        })
    }

    /// Walks `path` (dotted property names, `""` for the root) and returns
    /// the element type of the collection it names.
    pub fn collection_at(&self, path: &str) -> Option<Arc<TypeMeta>> {
        if path.is_empty() {
            return Some(Arc::clone(&self.root));
        }
        let mut meta = Arc::clone(&self.root);
        for part in path.split('.') {
            let idx = meta.find_property(part, self.case)?;
            let value_type = meta.property(idx)?.value_type();
            let next = value_type
                .element_type()
                .unwrap_or(value_type)
                .object_meta()?;
            meta = Arc::clone(next);
        }
        Some(meta)
    }

    fn resolve_in(
        &self,
        meta: &TypeMeta,
        name: &str,
        steps: &mut Vec<PathStep>,
        names: &mut Vec<String>,
        binding: &mut Binding,
    ) -> Option<ValueType> {
        if name.is_empty() {
            return None;
        }
        if let Some(segment) = self.lookup(meta, name)
            && let Some(leaf) = terminal(meta, segment)
        {
            steps.push(step_for(meta, segment));
            names.push(property_name(meta, segment));
            if let Some(property) = meta.property(segment.property) {
                *binding = property.binding();
            }
            return Some(leaf);
        }

        for separator in [self.separator, '_'] {
            for (pos, _) in name.match_indices(separator) {
                let head = &name[..pos];
                let tail = &name[pos + separator.len_utf8()..];
                if head.is_empty() || tail.is_empty() {
                    continue;
                }
                let Some(segment) = self.lookup(meta, head) else {
                    continue;
                };
                let Some(child) = nested_meta(meta, segment) else {
                    continue;
                };
                let mark = steps.len();
                steps.push(step_for(meta, segment));
                names.push(property_name(meta, segment));
                if let Some(leaf) = self.resolve_in(child, tail, steps, names, binding) {
                    return Some(leaf);
                }
                steps.truncate(mark);
                names.truncate(mark);
            }
        }
        None
    }

    fn lookup(&self, meta: &TypeMeta, segment: &str) -> Option<Segment> {
        if let Some(property) = meta.find_property(segment, self.case) {
            return Some(Segment {
                property,
                index: None,
                singular: false,
            });
        }
        if let Some((base, index)) = split_index(segment)
            && let Some(found) = self.list_property(meta, base)
        {
            return Some(Segment {
                index: Some(index),
                ..found
            });
        }
        self.list_property(meta, segment)
            .filter(|found| found.singular)
    }

    /// A list property named `name`, or whose name is `name` + `s`/`es`.
    fn list_property(&self, meta: &TypeMeta, name: &str) -> Option<Segment> {
        let is_list = |idx: usize| {
            meta.property(idx)
                .is_some_and(|p| p.value_type().element_type().is_some())
        };
        if let Some(property) = meta.find_property(name, self.case).filter(|&i| is_list(i)) {
            return Some(Segment {
                property,
                index: None,
                singular: false,
            });
        }
        ["s", "es"].iter().find_map(|suffix| {
            meta.find_property(&format!("{name}{suffix}"), self.case)
                .filter(|&i| is_list(i))
                .map(|property| Segment {
                    property,
                    index: None,
                    singular: true,
                })
        })
    }
}

/// `tags[3]`, `tags_3`, `tags3` into `("tags", 3)`.
fn split_index(segment: &str) -> Option<(&str, usize)> {
    if let Some(open) = segment.strip_suffix(']')
        && let Some((base, digits)) = open.rsplit_once('[')
    {
        return Some((base, digits.trim().parse().ok()?));
    }
    let digits_at = segment.trim_end_matches(|c: char| c.is_ascii_digit()).len();
    if digits_at == segment.len() || digits_at == 0 {
        return None;
    }
    let index = segment[digits_at..].parse().ok()?;
    let base = segment[..digits_at].trim_end_matches('_');
    (!base.is_empty()).then_some((base, index))
}

fn step_for(meta: &TypeMeta, segment: Segment) -> PathStep {
    let is_list = meta
        .property(segment.property)
        .is_some_and(|p| p.value_type().element_type().is_some());
    if is_list {
        PathStep::Element {
            property: segment.property,
            index: segment.index,
        }
    } else {
        PathStep::Property(segment.property)
    }
}

fn property_name(meta: &TypeMeta, segment: Segment) -> String {
    let name = meta
        .property(segment.property)
        .map_or("", |p| p.name());
    match segment.index {
        Some(index) => format!("{name}[{index}]"),
        None => name.to_string(),
    }
}

/// True when a value of `value_type` can be produced from a single cell.
pub fn is_single_cell(value_type: &ValueType) -> bool {
    if value_type.is_leaf() {
        return true;
    }
    value_type.object_meta().is_some_and(|meta| {
        meta.arity() == 1
            && meta.constructor_args().first().is_some_and(|&arg| {
                meta.property(arg)
                    .is_some_and(|p| p.value_type().scalar_kind().is_some())
            })
    })
}

/// Leaf type when `segment` ends the path, `None` if the property needs
/// more segments.
fn terminal(meta: &TypeMeta, segment: Segment) -> Option<ValueType> {
    let value_type = meta.property(segment.property)?.value_type();
    match (value_type.element_type(), segment.index, segment.singular) {
        // A list matched by its own name is filled element by element.
        (Some(element), _, _) => is_single_cell(element).then(|| element.clone()),
        (None, None, false) => is_single_cell(value_type).then(|| value_type.clone()),
        (None, _, _) => None,
    }
}

/// Type to continue resolving in after `segment`.
fn nested_meta(meta: &TypeMeta, segment: Segment) -> Option<&TypeMeta> {
    let value_type = meta.property(segment.property)?.value_type();
    match value_type.element_type() {
        Some(element) => element.object_meta().map(AsRef::as_ref),
        None if segment.index.is_none() && !segment.singular => {
            value_type.object_meta().map(AsRef::as_ref)
        }
        None => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rowmap_model::ScalarKind;

    fn root() -> Arc<TypeMeta> {
        let item = TypeMeta::builder("Item")
            .constructor_arg("sku", ValueType::scalar(ScalarKind::Text))
            .property("qty", ValueType::scalar(ScalarKind::I32))
            .build()
            .unwrap();
        let address = TypeMeta::builder("Address")
            .property("street", ValueType::scalar(ScalarKind::Text))
            .property("zip_code", ValueType::scalar(ScalarKind::Text))
            .build()
            .unwrap();
        TypeMeta::builder("Order")
            .constructor_arg("id", ValueType::scalar(ScalarKind::I64))
            .property("address", ValueType::object(address))
            .property("tags", ValueType::list(ValueType::scalar(ScalarKind::Text)))
            .property("items", ValueType::list(ValueType::object(item)))
            .property("boxes", ValueType::list(ValueType::scalar(ScalarKind::I32)))
            .build()
            .unwrap()
    }

    fn resolver(config: &MapperConfig) -> PathResolver {
        PathResolver::new(root(), config)
    }

    fn steps(name: &str) -> Vec<PathStep> {
        resolver(&MapperConfig::default())
            .resolve(name)
            .unwrap_or_else(|| panic!("{name} did not resolve"))
            .steps()
            .to_vec()
    }

    #[test]
    fn scalars_and_nested_objects() {
        assert_eq!(steps("id"), vec![PathStep::Property(0)]);
        assert_eq!(steps("ID"), vec![PathStep::Property(0)]);
        assert_eq!(steps("address.street"), vec![PathStep::Property(1), PathStep::Property(0)]);
        assert_eq!(steps("address_zip_code"), vec![PathStep::Property(1), PathStep::Property(1)]);
    }

    #[test]
    fn binding_follows_the_leaf_property() {
        let r = resolver(&MapperConfig::default());
        assert_eq!(
            r.resolve("id").unwrap().binding(),
            Binding::Constructor {
                position: 0,
                required: true
            }
        );
        assert_eq!(r.resolve("item_qty").unwrap().binding(), Binding::Setter);
        assert_eq!(
            r.resolve("item_sku").unwrap().binding(),
            Binding::Constructor {
                position: 0,
                required: true
            }
        );
    }

    #[test]
    fn case_sensitive_matching_is_exact() {
        let strict = resolver(&MapperConfig::strict());
        assert!(strict.resolve("ID").is_none());
        assert!(strict.resolve("id").is_some());
    }

    #[test]
    fn list_aliases() {
        let collection = PathStep::Element {
            property: 2,
            index: None,
        };
        assert_eq!(steps("tags"), vec![collection]);
        assert_eq!(steps("tag"), vec![collection]);
        assert_eq!(steps("box"), vec![PathStep::Element { property: 4, index: None }]);
        for indexed in ["tags[1]", "tags_1", "tags1", "tag1"] {
            assert_eq!(
                steps(indexed),
                vec![PathStep::Element {
                    property: 2,
                    index: Some(1)
                }],
                "{indexed}"
            );
        }
    }

    #[test]
    fn collection_of_objects() {
        let path = resolver(&MapperConfig::default()).resolve("items_sku").unwrap();
        assert_eq!(
            path.steps(),
            &[
                PathStep::Element {
                    property: 3,
                    index: None
                },
                PathStep::Property(0)
            ]
        );
        assert_eq!(path.as_str(), "items.sku");
        assert_eq!(steps("item.qty")[0], PathStep::Element { property: 3, index: None });
        assert_eq!(steps("items[0].qty")[0], PathStep::Element { property: 3, index: Some(0) });
    }

    #[test]
    fn unresolvable_names() {
        let r = resolver(&MapperConfig::default());
        assert!(r.resolve("nope").is_none());
        assert!(r.resolve("address").is_none());
        assert!(r.resolve("").is_none());
    }

    #[test]
    fn single_argument_objects_resolve_as_leaves() {
        let path = resolver(&MapperConfig::default()).resolve("items").unwrap();
        assert_eq!(path.steps(), &[PathStep::Element { property: 3, index: None }]);
        assert_eq!(path.leaf_type().object_meta().unwrap().name(), "Item");
    }

    #[test]
    fn collection_lookup_by_path() {
        let r = resolver(&MapperConfig::default());
        assert_eq!(r.collection_at("").unwrap().name(), "Order");
        assert_eq!(r.collection_at("items").unwrap().name(), "Item");
        assert!(r.collection_at("tags").is_none());
    }

    #[test]
    fn index_suffixes() {
        assert_eq!(split_index("a[2]"), Some(("a", 2)));
        assert_eq!(split_index("a_12"), Some(("a", 12)));
        assert_eq!(split_index("a7"), Some(("a", 7)));
        assert_eq!(split_index("abc"), None);
        assert_eq!(split_index("42"), None);
    }
}
