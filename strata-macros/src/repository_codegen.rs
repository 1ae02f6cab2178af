use proc_macro2::TokenStream;
use quote::quote;

use crate::crate_path::strata_core_path;
use crate::repository_parsing::{Marker, ParamKind, RepoMethod, RepositoryDef, ReturnKind};
use crate::types::Grouping;

pub fn generate(def: RepositoryDef) -> TokenStream {
    let krate = strata_core_path();
    let trait_item = rewrite_trait(&def);
    let trait_ident = &def.item.ident;
    let vis = &def.item.vis;
    let entity = &def.entity;
    let name = &def.struct_name;

    let descriptors = def.methods.iter().map(|m| descriptor(m, &krate));
    let impls = def.methods.iter().map(|m| method_impl(m, entity, &krate));
    let doc = format!("Repository implementing [`{trait_ident}`] over a provider `P`.");

    quote! {
        #trait_item

        #[doc = #doc]
        #vis struct #name<P> {
            repo: #krate::Repo<#entity, P>,
        }

        impl<P> ::core::clone::Clone for #name<P> {
            fn clone(&self) -> Self {
                Self { repo: ::core::clone::Clone::clone(&self.repo) }
            }
        }

        impl<P: #krate::Provider> #name<P> {
            /// Compile the repository methods and bind them to `provider`.
            pub fn new(
                provider: impl ::core::convert::Into<::std::sync::Arc<P>>,
            ) -> ::core::result::Result<Self, #krate::DataError> {
                ::core::result::Result::Ok(Self {
                    repo: #krate::Repo::new(provider, Self::descriptors())?,
                })
            }

            /// Like [`Self::new`], with pagination limits read from `config`.
            pub fn with_config(
                provider: impl ::core::convert::Into<::std::sync::Arc<P>>,
                config: &#krate::StrataConfig,
            ) -> ::core::result::Result<Self, #krate::DataError> {
                let pagination: #krate::PaginationSettings = config.section()?;
                let repo = #krate::Repo::new(provider, Self::descriptors())?.with_pagination(pagination);
                ::core::result::Result::Ok(Self { repo })
            }

            pub fn descriptors() -> ::std::vec::Vec<#krate::MethodDescriptor> {
                ::std::vec![#(#descriptors),*]
            }
        }

        impl<P> ::core::ops::Deref for #name<P> {
            type Target = #krate::Repo<#entity, P>;

            fn deref(&self) -> &Self::Target {
                &self.repo
            }
        }

        impl<P: #krate::Provider> #trait_ident for #name<P> {
            #(#impls)*
        }
    }
}

/// Replace each `async fn` with `fn -> impl Future + Send` so generated
/// repositories can be used from multi-threaded runtimes.
fn rewrite_trait(def: &RepositoryDef) -> syn::ItemTrait {
    let mut item = def.item.clone();
    for trait_item in item.items.iter_mut() {
        let syn::TraitItem::Fn(f) = trait_item else {
            continue;
        };
        if f.default.is_some() || f.sig.asyncness.is_none() {
            continue;
        }
        f.sig.asyncness = None;
        let output = match &f.sig.output {
            syn::ReturnType::Type(_, ty) => quote!(#ty),
            syn::ReturnType::Default => quote!(()),
        };
        f.sig.output = syn::parse_quote! {
            -> impl ::core::future::Future<Output = #output> + ::core::marker::Send
        };
    }
    item
}

fn descriptor(m: &RepoMethod, krate: &TokenStream) -> TokenStream {
    let name = m.sig.ident.to_string();

    let annotation = m.marker.as_ref().map(|marker| {
        let value = match marker {
            Marker::Insert => quote!(#krate::Annotation::Insert),
            Marker::Update => quote!(#krate::Annotation::Update),
            Marker::Delete => quote!(#krate::Annotation::Delete),
            Marker::Save => quote!(#krate::Annotation::Save),
            Marker::Query(text) => {
                quote!(#krate::Annotation::Query(::std::string::String::from(#text)))
            }
        };
        quote!(.annotate(#value))
    });

    let params = m.params.iter().map(|p| {
        let pname = p.ident.to_string();
        let role = match p.kind {
            ParamKind::SingleEntity => {
                quote!(#krate::ParamRole::Entity(#krate::EntityShape::Single))
            }
            ParamKind::Entity(Grouping::Collection) => {
                quote!(#krate::ParamRole::Entity(#krate::EntityShape::Collection))
            }
            ParamKind::Entity(Grouping::Array) => {
                quote!(#krate::ParamRole::Entity(#krate::EntityShape::Array))
            }
            ParamKind::Operand => quote!(#krate::ParamRole::Operand),
            ParamKind::Sort => quote!(#krate::ParamRole::Sort),
            ParamKind::Sorts => quote!(#krate::ParamRole::Sorts),
            ParamKind::Pageable => quote!(#krate::ParamRole::Pageable),
        };
        quote!(.param(#pname, #role))
    });

    let returns = match m.returns {
        ReturnKind::Unit => quote!(Unit),
        ReturnKind::Entity => quote!(Entity),
        ReturnKind::Entities => quote!(Entities),
        ReturnKind::Array => quote!(Array),
        ReturnKind::Optional => quote!(Optional),
        ReturnKind::Count => quote!(Count),
        ReturnKind::Flag => quote!(Flag),
        ReturnKind::Slice => quote!(Slice),
        ReturnKind::Page => quote!(Page),
        ReturnKind::KeysetSlice => quote!(KeysetSlice),
        ReturnKind::KeysetPage => quote!(KeysetPage),
    };

    let order_by = m.order_by.iter().map(|o| {
        let property = &o.property;
        let ctor = match (o.descending, o.ignore_case) {
            (false, false) => quote!(asc),
            (false, true) => quote!(asc_ignore_case),
            (true, false) => quote!(desc),
            (true, true) => quote!(desc_ignore_case),
        };
        quote!(.order_by(#krate::Sort::#ctor(#property)))
    });

    quote! {
        #krate::MethodDescriptor::new(#name)
            #annotation
            #(#params)*
            .returns(#krate::ReturnShape::#returns)
            #(#order_by)*
    }
}

fn method_impl(m: &RepoMethod, entity: &syn::Type, krate: &TokenStream) -> TokenStream {
    let mut sig = m.sig.clone();
    for input in sig.inputs.iter_mut() {
        if let syn::FnArg::Typed(pat_type) = input {
            pat_type.attrs.clear();
        }
    }
    let name = sig.ident.to_string();

    let builders = m.params.iter().map(|p| {
        let ident = &p.ident;
        match p.kind {
            ParamKind::SingleEntity => {
                quote!(.entity(<#entity as ::core::clone::Clone>::clone(&#ident)))
            }
            ParamKind::Entity(_) => quote!(.entities(#ident.iter())),
            ParamKind::Operand => quote!(.arg(&#ident)),
            ParamKind::Sort => quote!(.sort(#krate::Sort::clone(&#ident))),
            ParamKind::Sorts => quote!(.sorts(#ident.iter().cloned())),
            ParamKind::Pageable => quote!(.pageable(#krate::Pageable::clone(&#ident))),
        }
    });

    let convert = match m.returns {
        ReturnKind::Unit => quote!(into_unit),
        ReturnKind::Entity => quote!(into_entity),
        ReturnKind::Optional => quote!(into_optional),
        ReturnKind::Entities | ReturnKind::Array => quote!(into_entities),
        ReturnKind::Count => quote!(into_count),
        ReturnKind::Flag => quote!(into_flag),
        ReturnKind::Slice => quote!(into_slice),
        ReturnKind::Page => quote!(into_page),
        ReturnKind::KeysetSlice => quote!(into_keyset_slice),
        ReturnKind::KeysetPage => quote!(into_keyset_page),
    };

    quote! {
        #sig {
            let outcome = self
                .repo
                .invoke(#name, #krate::Invocation::new()#(#builders)*)
                .await?;
            ::core::result::Result::Ok(outcome.#convert()?)
        }
    }
}
