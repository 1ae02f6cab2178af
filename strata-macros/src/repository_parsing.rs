use syn::parse::{Parse, ParseStream};
use syn::spanned::Spanned;

use crate::types::{element_type, is_named, last_segment, same_name, single_arg, strip_reference, type_args, Grouping};

/// Arguments of `#[repository(entity = Product, name = ProductRepository)]`.
pub struct RepositoryArgs {
    pub entity: syn::Type,
    pub name: Option<syn::Ident>,
}

impl Parse for RepositoryArgs {
    fn parse(input: ParseStream) -> syn::Result<Self> {
        let mut entity = None;
        let mut name = None;
        while !input.is_empty() {
            let key: syn::Ident = input.parse()?;
            input.parse::<syn::Token![=]>()?;
            if key == "entity" {
                entity = Some(input.parse::<syn::Type>()?);
            } else if key == "name" {
                name = Some(input.parse::<syn::Ident>()?);
            } else {
                return Err(syn::Error::new(
                    key.span(),
                    "expected `entity` or `name` in #[repository(entity = Type, name = Ident)]",
                ));
            }
            if !input.is_empty() {
                input.parse::<syn::Token![,]>()?;
            }
        }
        let entity = entity.ok_or_else(|| {
            input.error(
                "#[repository] requires the managed entity type:\n\
                 \n  #[repository(entity = Product)]\n  pub trait Catalog { ... }",
            )
        })?;
        Ok(Self { entity, name })
    }
}

/// Operation marker found on a method.
pub enum Marker {
    Insert,
    Update,
    Delete,
    Save,
    Query(syn::LitStr),
}

impl Marker {
    fn label(&self) -> &'static str {
        match self {
            Marker::Insert => "#[insert]",
            Marker::Update => "#[update]",
            Marker::Delete => "#[delete]",
            Marker::Save => "#[save]",
            Marker::Query(_) => "#[query]",
        }
    }
}

/// A static sort from `#[order_by("property[,asc|desc][,ignorecase]")]`.
pub struct OrderSpec {
    pub property: String,
    pub descending: bool,
    pub ignore_case: bool,
}

#[derive(Clone, Copy)]
pub enum ParamKind {
    Entity(Grouping),
    /// A single entity, by value or by reference.
    SingleEntity,
    Operand,
    Sort,
    Sorts,
    Pageable,
}

pub struct RepoParam {
    pub ident: syn::Ident,
    pub kind: ParamKind,
}

#[derive(Clone, Copy, PartialEq, Eq)]
pub enum ReturnKind {
    Unit,
    Entity,
    Entities,
    Array,
    Optional,
    Count,
    Flag,
    Slice,
    Page,
    KeysetSlice,
    KeysetPage,
}

pub struct RepoMethod {
    pub sig: syn::Signature,
    pub marker: Option<Marker>,
    pub order_by: Vec<OrderSpec>,
    pub params: Vec<RepoParam>,
    pub returns: ReturnKind,
}

/// Parsed representation of a `#[repository] trait Name { ... }` block.
pub struct RepositoryDef {
    /// The trait with operation markers removed.
    pub item: syn::ItemTrait,
    pub entity: syn::Type,
    pub struct_name: syn::Ident,
    pub methods: Vec<RepoMethod>,
}

const DERIVED_PREFIXES: &[&str] = &["find", "count", "exists", "delete"];

const COUNT_TYPES: &[&str] = &[
    "u8", "u16", "u32", "u64", "u128", "usize", "i8", "i16", "i32", "i64", "i128", "isize",
];

pub fn parse(args: RepositoryArgs, mut item: syn::ItemTrait) -> syn::Result<RepositoryDef> {
    if !item.generics.params.is_empty() {
        return Err(syn::Error::new_spanned(
            &item.generics,
            "#[repository] traits cannot be generic",
        ));
    }

    let mut methods = Vec::new();
    for trait_item in item.items.iter_mut() {
        match trait_item {
            syn::TraitItem::Fn(f) if f.default.is_none() => {
                methods.push(parse_method(f, &args.entity)?);
            }
            syn::TraitItem::Fn(_) => {}
            other => {
                return Err(syn::Error::new_spanned(
                    other,
                    "#[repository] traits may only declare methods",
                ))
            }
        }
    }

    let struct_name = args
        .name
        .unwrap_or_else(|| quote::format_ident!("{}Repository", item.ident));
    Ok(RepositoryDef {
        item,
        entity: args.entity,
        struct_name,
        methods,
    })
}

fn parse_method(f: &mut syn::TraitItemFn, entity: &syn::Type) -> syn::Result<RepoMethod> {
    let (marker, order_by) = extract_markers(f)?;
    let sig = &f.sig;
    let name = sig.ident.to_string();

    if sig.asyncness.is_none() {
        return Err(syn::Error::new_spanned(
            &sig.fn_token,
            format!("repository method `{name}` must be an `async fn`"),
        ));
    }
    match sig.inputs.first() {
        Some(syn::FnArg::Receiver(r)) if r.reference.is_some() && r.mutability.is_none() => {}
        _ => {
            return Err(syn::Error::new_spanned(
                &sig.ident,
                format!("repository method `{name}` must take `&self`"),
            ))
        }
    }
    if marker.is_none() {
        let first = name
            .split('_')
            .next()
            .map(first_camel_word)
            .unwrap_or_default();
        if !DERIVED_PREFIXES.contains(&first.as_str()) {
            return Err(syn::Error::new_spanned(
                &sig.ident,
                format!(
                    "cannot derive a query from `{name}`\n\n\
                     hint: start the name with find, count, exists or delete \
                     (e.g. `find_by_name`), or annotate it with #[query(\"...\")]"
                ),
            ));
        }
    }

    let params = sig
        .inputs
        .iter()
        .skip(1)
        .map(|arg| parse_param(arg, entity))
        .collect::<syn::Result<Vec<_>>>()?;
    let returns = parse_return(&sig.output, entity)?;

    Ok(RepoMethod {
        sig: sig.clone(),
        marker,
        order_by,
        params,
        returns,
    })
}

fn first_camel_word(word: &str) -> String {
    word.chars()
        .enumerate()
        .take_while(|(i, c)| *i == 0 || !c.is_uppercase())
        .map(|(_, c)| c.to_ascii_lowercase())
        .collect()
}

/// Remove operation markers and `#[order_by]` from the method attributes.
fn extract_markers(f: &mut syn::TraitItemFn) -> syn::Result<(Option<Marker>, Vec<OrderSpec>)> {
    let mut markers: Vec<(Marker, proc_macro2::Span)> = Vec::new();
    let mut order_by = Vec::new();
    let mut kept = Vec::with_capacity(f.attrs.len());

    for attr in std::mem::take(&mut f.attrs) {
        let path = attr.path();
        let marker = if path.is_ident("insert") {
            Some(Marker::Insert)
        } else if path.is_ident("update") {
            Some(Marker::Update)
        } else if path.is_ident("delete") {
            Some(Marker::Delete)
        } else if path.is_ident("save") {
            Some(Marker::Save)
        } else if path.is_ident("query") {
            Some(Marker::Query(attr.parse_args::<syn::LitStr>()?))
        } else if path.is_ident("order_by") {
            let lit: syn::LitStr = attr.parse_args()?;
            order_by.push(parse_order_spec(&lit)?);
            None
        } else {
            kept.push(attr);
            continue;
        };
        if let Some(marker) = marker {
            markers.push((marker, attr.span()));
        }
    }
    f.attrs = kept;

    let mut markers = markers.into_iter();
    let first = markers.next();
    if let (Some((first, _)), Some((second, span))) = (&first, markers.next()) {
        return Err(syn::Error::new(
            span,
            format!(
                "conflicting operation markers {} and {} on `{}`: a repository method \
                 may carry only one of #[insert], #[update], #[delete], #[save] or #[query]",
                first.label(),
                second.label(),
                f.sig.ident
            ),
        ));
    }
    Ok((first.map(|(m, _)| m), order_by))
}

fn parse_order_spec(lit: &syn::LitStr) -> syn::Result<OrderSpec> {
    let value = lit.value();
    let mut parts = value.split(',').map(str::trim);
    let property = parts.next().unwrap_or_default().to_string();
    if property.is_empty() {
        return Err(syn::Error::new_spanned(lit, "#[order_by] needs an attribute name"));
    }
    let mut spec = OrderSpec {
        property,
        descending: false,
        ignore_case: false,
    };
    for part in parts {
        match part.to_ascii_lowercase().as_str() {
            "asc" => spec.descending = false,
            "desc" => spec.descending = true,
            "ignorecase" => spec.ignore_case = true,
            other => {
                return Err(syn::Error::new_spanned(
                    lit,
                    format!(
                        "unexpected `{other}` in #[order_by]: expected \"attribute[,asc|desc][,ignorecase]\""
                    ),
                ))
            }
        }
    }
    Ok(spec)
}

fn parse_param(arg: &syn::FnArg, entity: &syn::Type) -> syn::Result<RepoParam> {
    let syn::FnArg::Typed(pat_type) = arg else {
        return Err(syn::Error::new_spanned(arg, "unexpected receiver"));
    };
    let ident = match &*pat_type.pat {
        syn::Pat::Ident(pat) => pat.ident.clone(),
        other => {
            return Err(syn::Error::new_spanned(
                other,
                "repository method parameters must be plain identifiers: \
                 they name the query parameters",
            ))
        }
    };

    let ty = strip_reference(&pat_type.ty);
    let kind = if is_named(ty, "Pageable") {
        ParamKind::Pageable
    } else if is_named(ty, "Sort") {
        ParamKind::Sort
    } else if same_name(ty, entity) {
        ParamKind::SingleEntity
    } else {
        match element_type(ty) {
            Some((elem, _)) if is_named(elem, "Sort") => ParamKind::Sorts,
            Some((elem, grouping)) if same_name(elem, entity) => ParamKind::Entity(grouping),
            _ => ParamKind::Operand,
        }
    };
    Ok(RepoParam { ident, kind })
}

fn parse_return(output: &syn::ReturnType, entity: &syn::Type) -> syn::Result<ReturnKind> {
    let syn::ReturnType::Type(_, ty) = output else {
        return Err(syn::Error::new_spanned(
            output,
            "repository methods must return `Result<_, DataError>`",
        ));
    };
    let inner = last_segment(ty)
        .filter(|s| s.ident == "Result")
        .and_then(|s| type_args(s).first().copied())
        .ok_or_else(|| {
            syn::Error::new_spanned(ty, "repository methods must return `Result<_, DataError>`")
        })?;

    let unsupported = || {
        syn::Error::new_spanned(
            inner,
            "unsupported repository return type\n\n\
             supported: (), the entity, Option<E>, Vec<E>, VecDeque<E>, Box<[E]>, bool, \
             an integer count, Slice<E>, Page<E>, KeysetAwareSlice<E>, KeysetAwarePage<E>",
        )
    };

    if let syn::Type::Tuple(tuple) = inner {
        return if tuple.elems.is_empty() {
            Ok(ReturnKind::Unit)
        } else {
            Err(unsupported())
        };
    }
    if same_name(inner, entity) {
        return Ok(ReturnKind::Entity);
    }
    if let Some(opt) = single_arg(inner, "Option") {
        return if same_name(opt, entity) {
            Ok(ReturnKind::Optional)
        } else {
            Err(unsupported())
        };
    }
    if is_named(inner, "bool") {
        return Ok(ReturnKind::Flag);
    }
    if COUNT_TYPES.iter().any(|t| is_named(inner, t)) {
        return Ok(ReturnKind::Count);
    }
    let windows = [
        ("Slice", ReturnKind::Slice),
        ("Page", ReturnKind::Page),
        ("KeysetAwareSlice", ReturnKind::KeysetSlice),
        ("KeysetAwarePage", ReturnKind::KeysetPage),
    ];
    for (name, kind) in windows {
        if let Some(elem) = single_arg(inner, name) {
            return if same_name(elem, entity) {
                Ok(kind)
            } else {
                Err(unsupported())
            };
        }
    }
    if matches!(inner, syn::Type::Path(_)) {
        if let Some((elem, grouping)) = element_type(inner) {
            if same_name(elem, entity) {
                return Ok(match grouping {
                    Grouping::Array => ReturnKind::Array,
                    Grouping::Collection => ReturnKind::Entities,
                });
            }
        }
    }
    Err(unsupported())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entity() -> syn::Type {
        syn::parse_quote!(Product)
    }

    fn method(tokens: proc_macro2::TokenStream) -> syn::Result<RepoMethod> {
        let mut f: syn::TraitItemFn = syn::parse2(tokens).unwrap();
        parse_method(&mut f, &entity())
    }

    #[test]
    fn test_conflicting_markers_are_rejected() {
        let err = method(quote::quote! {
            #[insert]
            #[update]
            async fn store(&self, p: Product) -> Result<(), DataError>;
        })
        .err()
        .unwrap();
        assert!(err.to_string().contains("#[insert] and #[update]"));
    }

    #[test]
    fn test_return_kinds() {
        let m = method(quote::quote! {
            async fn find_by_name(&self, name: &str, page: &Pageable) -> Result<KeysetAwareSlice<Product>, DataError>;
        })
        .unwrap();
        assert!(m.returns == ReturnKind::KeysetSlice);
        assert!(matches!(m.params[0].kind, ParamKind::Operand));
        assert!(matches!(m.params[1].kind, ParamKind::Pageable));

        let m = method(quote::quote! {
            async fn find_by_departments_contains(&self, d: Department) -> Result<Box<[Product]>, DataError>;
        })
        .unwrap();
        assert!(m.returns == ReturnKind::Array);
    }

    #[test]
    fn test_order_spec() {
        let spec = parse_order_spec(&syn::parse_quote!("price, DESC")).unwrap();
        assert_eq!(spec.property, "price");
        assert!(spec.descending && !spec.ignore_case);
        assert!(parse_order_spec(&syn::parse_quote!("price,sideways")).is_err());
    }

    #[test]
    fn test_unannotated_name_must_be_derivable() {
        let err = method(quote::quote! {
            async fn cheapest(&self) -> Result<Vec<Product>, DataError>;
        })
        .err()
        .unwrap();
        assert!(err.to_string().contains("cannot derive a query"));

        assert!(method(quote::quote! {
            async fn findByName(&self, name: String) -> Result<Vec<Product>, DataError>;
        })
        .is_ok());
    }
}
