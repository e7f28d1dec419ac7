//! `Error` derive.
//!
//! ```ignore
//! #[derive(Debug, Error)]
//! pub enum TrieError {
//!     #[error("missing node {0}")]
//!     MissingNode(Hash),
//!     #[error("expected {expected}, got {actual}")]
//!     Mismatch { expected: Hash, actual: Hash },
//! }
//! ```
//!
//! Tuple fields are referenced positionally (`{0}`), struct fields by name.

use proc_macro::TokenStream;
use proc_macro2::TokenStream as TokenStream2;
use quote::{ToTokens, format_ident, quote};
use syn::{Attribute, Data, DeriveInput, Fields, Lit, Meta, parse_macro_input};

pub fn derive(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    match expand(&input) {
        Ok(tokens) => tokens.into(),
        Err(err) => err.to_compile_error().into(),
    }
}

fn expand(input: &DeriveInput) -> syn::Result<TokenStream2> {
    let name = &input.ident;
    let (impl_generics, ty_generics, where_clause) = input.generics.split_for_impl();

    let body = match &input.data {
        Data::Enum(data) => {
            let arms = data
                .variants
                .iter()
                .map(|variant| {
                    let ident = &variant.ident;
                    let message = message(&variant.attrs, variant)?;
                    Ok(display_arm(quote!(Self::#ident), &variant.fields, &message))
                })
                .collect::<syn::Result<Vec<_>>>()?;
            quote! {
                match self {
                    #(#arms)*
                }
            }
        }
        Data::Struct(data) => {
            let message = message(&input.attrs, &input.ident)?;
            let arm = display_arm(quote!(Self), &data.fields, &message);
            quote! {
                match self {
                    #arm
                }
            }
        }
        Data::Union(_) => {
            return Err(syn::Error::new_spanned(
                input,
                "Error cannot be derived for unions",
            ));
        }
    };

    Ok(quote! {
        impl #impl_generics ::std::fmt::Display for #name #ty_generics #where_clause {
            #[allow(unused_variables)]
            fn fmt(&self, f: &mut ::std::fmt::Formatter<'_>) -> ::std::fmt::Result {
                #body
            }
        }

        impl #impl_generics ::std::error::Error for #name #ty_generics #where_clause {}
    })
}

fn display_arm(path: TokenStream2, fields: &Fields, message: &str) -> TokenStream2 {
    match fields {
        Fields::Unit => quote!(#path => write!(f, #message),),
        Fields::Named(named) => {
            let idents: Vec<_> = named.named.iter().filter_map(|f| f.ident.as_ref()).collect();
            let used: Vec<_> = idents
                .iter()
                .filter(|ident| references(message, &ident.to_string()))
                .collect();
            quote!(#path { #(#idents),* } => write!(f, #message, #(#used = #used),*),)
        }
        Fields::Unnamed(unnamed) => {
            let idents: Vec<_> = (0..unnamed.unnamed.len())
                .map(|i| format_ident!("f{}", i))
                .collect();
            let used: Vec<_> = idents
                .iter()
                .enumerate()
                .filter(|(i, _)| references(message, &i.to_string()))
                .map(|(_, ident)| ident)
                .collect();
            let mut format = message.to_string();
            for i in (0..idents.len()).rev() {
                format = format.replace(&format!("{{{i}"), &format!("{{f{i}"));
            }
            quote!(#path ( #(#idents),* ) => write!(f, #format, #(#used = #used),*),)
        }
    }
}

/// True if the format string interpolates `name`, with or without a format spec.
fn references(message: &str, name: &str) -> bool {
    message.contains(&format!("{{{name}}}")) || message.contains(&format!("{{{name}:"))
}

fn message<T: ToTokens>(attrs: &[Attribute], target: &T) -> syn::Result<String> {
    let Some(attr) = attrs.iter().find(|a| a.path().is_ident("error")) else {
        return Err(syn::Error::new_spanned(
            target,
            "missing #[error(\"...\")] attribute",
        ));
    };
    let Meta::List(list) = &attr.meta else {
        return Err(syn::Error::new_spanned(
            &attr.meta,
            "expected #[error(\"...\")]",
        ));
    };
    match syn::parse2::<Lit>(list.tokens.clone()) {
        Ok(Lit::Str(lit)) => Ok(lit.value()),
        _ => Err(syn::Error::new_spanned(
            &attr.meta,
            "#[error] takes a single string literal",
        )),
    }
}
