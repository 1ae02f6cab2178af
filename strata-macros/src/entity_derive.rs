use proc_macro::TokenStream;
use proc_macro2::TokenStream as TokenStream2;
use quote::quote;
use syn::{parse_macro_input, Data, DeriveInput, Fields};

use crate::crate_path::strata_core_path;
use crate::types::element_type;

pub fn expand(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    match generate(&input) {
        Ok(output) => output.into(),
        Err(err) => err.to_compile_error().into(),
    }
}

struct FieldInfo {
    ident: syn::Ident,
    ty: syn::Type,
    /// Attribute name: the field name without any `r#` prefix.
    name: String,
    is_id: bool,
    is_collection: bool,
}

/// `#[entity(name = "...")]` on the struct, defaulting to the struct name.
fn entity_name(input: &DeriveInput) -> syn::Result<String> {
    let mut name = None;
    for attr in input.attrs.iter().filter(|a| a.path().is_ident("entity")) {
        attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("name") {
                let lit: syn::LitStr = meta.value()?.parse()?;
                name = Some(lit.value());
                Ok(())
            } else {
                Err(meta.error("expected `name` in #[entity(name = \"...\")]"))
            }
        })?;
    }
    Ok(name.unwrap_or_else(|| input.ident.to_string()))
}

fn collect_fields(input: &DeriveInput) -> syn::Result<Vec<FieldInfo>> {
    let named = match &input.data {
        Data::Struct(data) => match &data.fields {
            Fields::Named(named) => &named.named,
            _ => {
                return Err(syn::Error::new_spanned(
                    &input.ident,
                    "#[derive(Entity)] only works on structs with named fields:\n\
                     \n  #[derive(Entity, Clone)]\n  struct Product {\n      #[id] product_num: String,\n      name: String,\n  }",
                ))
            }
        },
        _ => {
            return Err(syn::Error::new_spanned(
                &input.ident,
                "#[derive(Entity)] only works on structs, enums and unions are not supported",
            ))
        }
    };

    let mut fields = Vec::with_capacity(named.len());
    for field in named {
        let Some(ident) = field.ident.clone() else {
            continue;
        };
        let mut is_collection = element_type(&field.ty).is_some();
        for attr in field.attrs.iter().filter(|a| a.path().is_ident("entity")) {
            attr.parse_nested_meta(|meta| {
                if meta.path.is_ident("collection") {
                    is_collection = true;
                    Ok(())
                } else if meta.path.is_ident("scalar") {
                    is_collection = false;
                    Ok(())
                } else {
                    Err(meta.error("expected `collection` or `scalar`"))
                }
            })?;
        }
        let name = ident.to_string().trim_start_matches("r#").to_string();
        fields.push(FieldInfo {
            is_id: field.attrs.iter().any(|a| a.path().is_ident("id")),
            ident,
            ty: field.ty.clone(),
            name,
            is_collection,
        });
    }
    Ok(fields)
}

fn generate(input: &DeriveInput) -> syn::Result<TokenStream2> {
    let ident = &input.ident;
    let entity_name = entity_name(input)?;
    let fields = collect_fields(input)?;

    let marked: Vec<&FieldInfo> = fields.iter().filter(|f| f.is_id).collect();
    let id = match marked.as_slice() {
        [one] => *one,
        [] => fields.iter().find(|f| f.name == "id").ok_or_else(|| {
            syn::Error::new_spanned(
                ident,
                "#[derive(Entity)] needs an identifier: mark one field with #[id] \
                 or name it `id`",
            )
        })?,
        [_, second, ..] => {
            return Err(syn::Error::new_spanned(
                &second.ident,
                "only one field may be marked #[id]",
            ))
        }
    };
    if id.is_collection {
        return Err(syn::Error::new_spanned(
            &id.ident,
            "the #[id] field cannot be a collection",
        ));
    }

    let krate = strata_core_path();
    let id_ident = &id.ident;
    let id_ty = &id.ty;
    let id_name = &id.name;

    let infos = fields.iter().map(|f| {
        let name = &f.name;
        if f.is_collection {
            quote! { #krate::AttributeInfo::collection(#name) }
        } else {
            quote! { #krate::AttributeInfo::scalar(#name) }
        }
    });
    let getters = fields.iter().map(|f| {
        let name = &f.name;
        let field = &f.ident;
        quote! { #name => ::core::option::Option::Some(#krate::IntoValue::to_value(&self.#field)), }
    });
    let checked = fields.iter().map(|f| {
        let name = &f.name;
        let field = &f.ident;
        quote! {
            record.insert(
                ::std::string::ToString::to_string(#name),
                #krate::IntoValue::try_to_value(&self.#field, #name)?,
            );
        }
    });
    let inits = fields.iter().map(|f| {
        let name = &f.name;
        let field = &f.ident;
        quote! {
            #field: #krate::FromValue::from_value(
                #krate::entity::take_attribute(&mut record, #name),
                #name,
            )?,
        }
    });
    let (impl_generics, ty_generics, where_clause) = input.generics.split_for_impl();

    Ok(quote! {
        impl #impl_generics #krate::Entity for #ident #ty_generics #where_clause {
            type Id = #id_ty;

            fn entity_name() -> &'static str {
                #entity_name
            }

            fn id_attribute() -> &'static str {
                #id_name
            }

            fn attributes() -> &'static [#krate::AttributeInfo] {
                const ATTRIBUTES: &[#krate::AttributeInfo] = &[#(#infos),*];
                ATTRIBUTES
            }

            fn id(&self) -> &Self::Id {
                &self.#id_ident
            }

            fn get(&self, attribute: &str) -> ::core::option::Option<#krate::Value> {
                match attribute {
                    #(#getters)*
                    _ => ::core::option::Option::None,
                }
            }

            fn try_to_record(
                &self,
            ) -> ::core::result::Result<#krate::Record, #krate::DataError> {
                let mut record = #krate::Record::new();
                #(#checked)*
                ::core::result::Result::Ok(record)
            }

            fn from_record(
                mut record: #krate::Record,
            ) -> ::core::result::Result<Self, #krate::DataError> {
                ::core::result::Result::Ok(Self {
                    #(#inits)*
                })
            }
        }
    })
}
