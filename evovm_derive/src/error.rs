//! Derive macro for error enums.
//!
//! Generates `std::fmt::Display` and `std::error::Error` implementations
//! from `#[error("...")]` attributes on each variant.
//!
//! # Usage
//!
//! ```ignore
//! use evovm_derive::Error;
//!
//! #[derive(Debug, Error)]
//! pub enum VmError {
//!     #[error("unknown instruction: {0}")]
//!     UnknownInstruction(String),
//!
//!     #[error("position {pos} out of range (genome length {len})")]
//!     InvalidPosition { pos: usize, len: usize },
//! }
//! ```
//!
//! Tuple fields interpolate positionally (`{0}`, `{1}`); named fields by
//! name (`{pos}`).

use proc_macro::TokenStream;
use quote::{format_ident, quote};
use syn::{parse_macro_input, Data, DeriveInput, Fields, Lit, Meta};

pub fn derive_error(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);

    match expand(&input) {
        Ok(tokens) => TokenStream::from(tokens),
        Err(err) => err.to_compile_error().into(),
    }
}

fn expand(input: &DeriveInput) -> syn::Result<proc_macro2::TokenStream> {
    let name = &input.ident;
    let (impl_generics, ty_generics, where_clause) = input.generics.split_for_impl();

    let data = match &input.data {
        Data::Enum(data) => data,
        _ => {
            return Err(syn::Error::new_spanned(
                input,
                "Error derive only supports enums",
            ));
        }
    };

    let arms = data
        .variants
        .iter()
        .map(display_arm)
        .collect::<syn::Result<Vec<_>>>()?;

    Ok(quote! {
        impl #impl_generics ::std::fmt::Display for #name #ty_generics #where_clause {
            fn fmt(&self, f: &mut ::std::fmt::Formatter<'_>) -> ::std::fmt::Result {
                match self {
                    #(#arms)*
                }
            }
        }

        impl #impl_generics ::std::error::Error for #name #ty_generics #where_clause {}
    })
}

/// Builds one `Display` match arm for a variant.
fn display_arm(variant: &syn::Variant) -> syn::Result<proc_macro2::TokenStream> {
    let ident = &variant.ident;
    let message = error_message(variant)?;

    let arm = match &variant.fields {
        Fields::Unit => quote! {
            Self::#ident => write!(f, #message),
        },
        Fields::Unnamed(fields) => {
            let bindings: Vec<_> = (0..fields.unnamed.len())
                .map(|i| format_ident!("f{}", i))
                .collect();
            let format_str = positional_to_named(&message, fields.unnamed.len());
            quote! {
                Self::#ident(#(#bindings),*) => write!(f, #format_str, #(#bindings = #bindings),*),
            }
        }
        Fields::Named(fields) => {
            let bindings: Vec<_> = fields.named.iter().map(|f| &f.ident).collect();
            quote! {
                Self::#ident { #(#bindings),* } => write!(f, #message, #(#bindings = #bindings),*),
            }
        }
    };

    Ok(arm)
}

/// Extracts the string literal from a variant's `#[error("...")]` attribute.
fn error_message(variant: &syn::Variant) -> syn::Result<String> {
    for attr in &variant.attrs {
        if !attr.path().is_ident("error") {
            continue;
        }
        let Meta::List(meta_list) = &attr.meta else {
            return Err(syn::Error::new_spanned(
                &attr.meta,
                "invalid #[error] attribute; use #[error(\"message\")]",
            ));
        };
        let lit = syn::parse2::<Lit>(meta_list.tokens.clone()).map_err(|_| {
            syn::Error::new_spanned(
                &attr.meta,
                "expected a string literal, e.g. #[error(\"invalid opcode: {0}\")]",
            )
        })?;
        if let Lit::Str(lit_str) = lit {
            return Ok(lit_str.value());
        }
        return Err(syn::Error::new_spanned(
            &attr.meta,
            "#[error] message must be a string literal",
        ));
    }

    Err(syn::Error::new_spanned(
        variant,
        format!(
            "missing #[error(\"...\")] attribute on variant `{}`",
            variant.ident
        ),
    ))
}

/// Rewrites positional format args `{0}`, `{1}` to the `{f0}`, `{f1}`
/// bindings used in the match arm.
fn positional_to_named(format_str: &str, field_count: usize) -> String {
    let mut result = format_str.to_string();
    for i in (0..field_count).rev() {
        result = result.replace(&format!("{{{}}}", i), &format!("{{f{}}}", i));
    }
    result
}
