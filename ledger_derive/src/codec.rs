//! `BinaryCodec` derive.
//!
//! Fields are written in declaration order through `Encode::encode` and read
//! back in the same order through `Decode::decode`. Enums are prefixed with a
//! one-byte discriminant that follows Rust's implicit numbering and honours
//! explicit `Variant = N` literals.

use proc_macro::TokenStream;
use proc_macro2::TokenStream as TokenStream2;
use quote::{format_ident, quote};
use syn::{Data, DataEnum, DeriveInput, Fields, parse_macro_input};

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

    let (encode_body, decode_body) = match &input.data {
        Data::Struct(data) => {
            let bindings = bindings(&data.fields);
            let pattern = destructure(quote!(Self), &data.fields, &bindings);
            let writes = bindings.iter().map(|b| quote!(crate::types::encoding::Encode::encode(#b, out);));
            let construct = construct(quote!(Self), &data.fields);
            (
                quote! {
                    let #pattern = self;
                    #(#writes)*
                },
                quote!(Ok(#construct)),
            )
        }
        Data::Enum(data) => expand_enum(data)?,
        Data::Union(_) => {
            return Err(syn::Error::new_spanned(
                input,
                "BinaryCodec cannot be derived for unions",
            ));
        }
    };

    Ok(quote! {
        impl #impl_generics crate::types::encoding::Encode for #name #ty_generics #where_clause {
            #[allow(unused_variables)]
            fn encode<S: crate::types::encoding::EncodeSink>(&self, out: &mut S) {
                #encode_body
            }
        }

        impl #impl_generics crate::types::encoding::Decode for #name #ty_generics #where_clause {
            #[allow(unused_variables)]
            fn decode(input: &mut &[u8]) -> ::std::result::Result<Self, crate::types::encoding::DecodeError> {
                #decode_body
            }
        }
    })
}

fn expand_enum(data: &DataEnum) -> syn::Result<(TokenStream2, TokenStream2)> {
    let tags = discriminants(data)?;
    let mut encode_arms = Vec::with_capacity(data.variants.len());
    let mut decode_arms = Vec::with_capacity(data.variants.len());

    for (variant, tag) in data.variants.iter().zip(tags) {
        let ident = &variant.ident;
        let bindings = bindings(&variant.fields);
        let pattern = destructure(quote!(Self::#ident), &variant.fields, &bindings);
        let writes = bindings.iter().map(|b| quote!(crate::types::encoding::Encode::encode(#b, out);));
        encode_arms.push(quote! {
            #pattern => {
                crate::types::encoding::Encode::encode(&#tag, out);
                #(#writes)*
            }
        });

        let construct = construct(quote!(Self::#ident), &variant.fields);
        decode_arms.push(quote!(#tag => Ok(#construct),));
    }

    Ok((
        quote! {
            match self {
                #(#encode_arms)*
            }
        },
        quote! {
            let tag: u8 = crate::types::encoding::Decode::decode(input)?;
            match tag {
                #(#decode_arms)*
                _ => Err(crate::types::encoding::DecodeError::InvalidValue),
            }
        },
    ))
}

/// Local names bound to each field when destructuring `self`.
fn bindings(fields: &Fields) -> Vec<syn::Ident> {
    match fields {
        Fields::Named(named) => named
            .named
            .iter()
            .filter_map(|f| f.ident.clone())
            .collect(),
        Fields::Unnamed(unnamed) => (0..unnamed.unnamed.len())
            .map(|i| format_ident!("f{}", i))
            .collect(),
        Fields::Unit => Vec::new(),
    }
}

fn destructure(path: TokenStream2, fields: &Fields, bindings: &[syn::Ident]) -> TokenStream2 {
    match fields {
        Fields::Named(_) => quote!(#path { #(#bindings),* }),
        Fields::Unnamed(_) => quote!(#path ( #(#bindings),* )),
        Fields::Unit => quote!(#path),
    }
}

fn construct(path: TokenStream2, fields: &Fields) -> TokenStream2 {
    match fields {
        Fields::Named(named) => {
            let reads = named.named.iter().map(|f| {
                let ident = &f.ident;
                quote!(#ident: crate::types::encoding::Decode::decode(input)?,)
            });
            quote!(#path { #(#reads)* })
        }
        Fields::Unnamed(unnamed) => {
            let reads = unnamed
                .unnamed
                .iter()
                .map(|_| quote!(crate::types::encoding::Decode::decode(input)?,));
            quote!(#path ( #(#reads)* ))
        }
        Fields::Unit => quote!(#path),
    }
}

fn discriminants(data: &DataEnum) -> syn::Result<Vec<u8>> {
    let mut tags = Vec::with_capacity(data.variants.len());
    let mut next: u16 = 0;

    for variant in &data.variants {
        let tag = match &variant.discriminant {
            Some((_, syn::Expr::Lit(syn::ExprLit {
                lit: syn::Lit::Int(lit),
                ..
            }))) => lit.base10_parse::<u8>()? as u16,
            Some((_, expr)) => {
                return Err(syn::Error::new_spanned(
                    expr,
                    "BinaryCodec discriminants must be integer literals",
                ));
            }
            None => next,
        };
        if tag > u8::MAX as u16 {
            return Err(syn::Error::new_spanned(
                variant,
                "BinaryCodec supports at most 256 variants",
            ));
        }
        tags.push(tag as u8);
        next = tag + 1;
    }

    Ok(tags)
}
