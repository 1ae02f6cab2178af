//! Crate path resolution for generated code.
//!
//! Detects whether the user depends on `strata` (facade) or `strata-core`
//! directly, and returns the appropriate path prefix for generated code.

use proc_macro2::TokenStream;
use proc_macro_crate::{crate_name, FoundCrate};
use quote::quote;

fn found_path(found: FoundCrate) -> TokenStream {
    match found {
        FoundCrate::Itself => quote!(crate),
        FoundCrate::Name(name) => {
            let ident = syn::Ident::new(&name, proc_macro2::Span::call_site());
            quote!(::#ident)
        }
    }
}

/// Returns the token stream for accessing `strata_core` types.
///
/// If the user depends on `strata`, returns `::strata`.
/// Otherwise returns `::strata_core`.
pub fn strata_core_path() -> TokenStream {
    if let Ok(found) = crate_name("strata") {
        found_path(found)
    } else if let Ok(found) = crate_name("strata-core") {
        found_path(found)
    } else {
        // Fallback - assume strata_core is available (for error messages)
        quote!(::strata_core)
    }
}
