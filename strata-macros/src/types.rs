//! Syntactic inspection of types in item signatures.

/// Last path segment of a type such as `std::vec::Vec<T>`.
pub fn last_segment(ty: &syn::Type) -> Option<&syn::PathSegment> {
    match ty {
        syn::Type::Path(type_path) if type_path.qself.is_none() => type_path.path.segments.last(),
        syn::Type::Group(group) => last_segment(&group.elem),
        syn::Type::Paren(paren) => last_segment(&paren.elem),
        _ => None,
    }
}

/// Type arguments of a path segment: `T` in `Vec<T>`.
pub fn type_args(segment: &syn::PathSegment) -> Vec<&syn::Type> {
    match &segment.arguments {
        syn::PathArguments::AngleBracketed(args) => args
            .args
            .iter()
            .filter_map(|arg| match arg {
                syn::GenericArgument::Type(ty) => Some(ty),
                _ => None,
            })
            .collect(),
        _ => Vec::new(),
    }
}

/// The single type argument of `Name<T>`, if `ty` is such a type.
pub fn single_arg<'a>(ty: &'a syn::Type, name: &str) -> Option<&'a syn::Type> {
    let segment = last_segment(ty)?;
    if segment.ident != name {
        return None;
    }
    match type_args(segment).as_slice() {
        [inner] => Some(inner),
        _ => None,
    }
}

/// `&T` and `&mut T` become `T`.
pub fn strip_reference(ty: &syn::Type) -> &syn::Type {
    match ty {
        syn::Type::Reference(r) => strip_reference(&r.elem),
        other => other,
    }
}

/// Whether the last path segment of `ty` is `name`.
pub fn is_named(ty: &syn::Type, name: &str) -> bool {
    last_segment(ty).is_some_and(|s| s.ident == name)
}

/// Whether two types name the same item, comparing last path segments.
pub fn same_name(a: &syn::Type, b: &syn::Type) -> bool {
    match (last_segment(a), last_segment(b)) {
        (Some(a), Some(b)) => a.ident == b.ident,
        _ => false,
    }
}

/// How a type groups elements of an inner type.
#[derive(Clone, Copy, PartialEq, Eq)]
pub enum Grouping {
    /// `Vec<T>`, `VecDeque<T>`, sets
    Collection,
    /// `[T; N]`, `&[T]`, `Box<[T]>`
    Array,
}

const COLLECTIONS: &[&str] = &["Vec", "VecDeque", "LinkedList", "BTreeSet", "HashSet"];

/// Element type and grouping of a collection or array type, looking
/// through references.
pub fn element_type(ty: &syn::Type) -> Option<(&syn::Type, Grouping)> {
    match strip_reference(ty) {
        syn::Type::Array(array) => Some((&array.elem, Grouping::Array)),
        syn::Type::Slice(slice) => Some((&slice.elem, Grouping::Array)),
        other => {
            if let Some(inner) = single_arg(other, "Box") {
                return match strip_reference(inner) {
                    syn::Type::Slice(slice) => Some((&slice.elem, Grouping::Array)),
                    _ => None,
                };
            }
            COLLECTIONS
                .iter()
                .find_map(|name| single_arg(other, name))
                .map(|inner| (inner, Grouping::Collection))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_element_type_of_collections_and_arrays() {
        let ty: syn::Type = syn::parse_quote!(Vec<Product>);
        assert!(matches!(element_type(&ty), Some((_, Grouping::Collection))));

        let ty: syn::Type = syn::parse_quote!(&[Product]);
        assert!(matches!(element_type(&ty), Some((_, Grouping::Array))));

        let ty: syn::Type = syn::parse_quote!(Box<[Product]>);
        let (inner, grouping) = element_type(&ty).unwrap();
        assert!(grouping == Grouping::Array && is_named(inner, "Product"));

        let ty: syn::Type = syn::parse_quote!(Option<Product>);
        assert!(element_type(&ty).is_none());
    }

    #[test]
    fn test_same_name_ignores_paths() {
        let a: syn::Type = syn::parse_quote!(crate::model::Product);
        let b: syn::Type = syn::parse_quote!(Product);
        assert!(same_name(&a, &b));
    }
}
