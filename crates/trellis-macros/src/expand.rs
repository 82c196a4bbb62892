//! Code generation for `#[derive(Record)]`.

use proc_macro2::TokenStream;
use quote::{format_ident, quote};
use syn::{Data, DeriveInput, Fields, Result};

use crate::parse::FieldAttrs;

/// Expands the derive into a `Record` implementation with a compiled field
/// descriptor table.
pub fn expand_record(input: &DeriveInput) -> Result<TokenStream> {
    let name = &input.ident;

    let Data::Struct(data) = &input.data else {
        return Err(syn::Error::new_spanned(
            input,
            "Record can only be derived for structs",
        ));
    };
    let Fields::Named(fields) = &data.fields else {
        return Err(syn::Error::new_spanned(
            input,
            "Record requires a struct with named fields",
        ));
    };

    let mut helpers = Vec::new();
    let mut specs = Vec::new();

    for field in &fields.named {
        let attrs = FieldAttrs::parse(field)?;
        let ident = field.ident.as_ref().expect("named field");
        let ty = &field.ty;
        let field_name = ident.to_string();

        let set_fn = format_ident!("__record_set_{}", ident);
        let get_fn = format_ident!("__record_get_{}", ident);

        if attrs.nested {
            let nested_fn = format_ident!("__record_nested_{}", ident);
            helpers.push(quote! {
                fn #set_fn(_record: &mut #name, raw: &str) -> ::core::result::Result<(), ::trellis_bind::ValueError> {
                    ::core::result::Result::Err(::trellis_bind::ValueError {
                        value: raw.to_string(),
                        ty: "nested record",
                    })
                }
                fn #get_fn(_record: &#name) -> ::trellis_bind::FieldValue<'_> {
                    ::trellis_bind::FieldValue::Opaque
                }
                fn #nested_fn() -> ::core::result::Result<
                    ::std::boxed::Box<dyn Fn(&#name) -> ::core::result::Result<(), ::trellis_bind::__core::Problem> + Send + Sync>,
                    ::trellis_bind::BuildError,
                > {
                    let sub = ::trellis_bind::compile_builtin::<#ty>()?;
                    ::core::result::Result::Ok(::std::boxed::Box::new(move |record: &#name| sub.check(&record.#ident)))
                }
            });
            let validate = attrs.validate.unwrap_or_default();
            specs.push(quote! {
                ::trellis_bind::FieldSpec {
                    name: #field_name,
                    source: ::trellis_bind::Source::None,
                    default: ::core::option::Option::None,
                    decrypt: ::core::option::Option::None,
                    validate: #validate,
                    file: ::core::option::Option::None,
                    set: #set_fn,
                    get: #get_fn,
                    set_bytes: ::core::option::Option::None,
                    nested: ::core::option::Option::Some(#nested_fn),
                }
            });
            continue;
        }

        helpers.push(quote! {
            fn #get_fn(record: &#name) -> ::trellis_bind::FieldValue<'_> {
                ::trellis_bind::AsFieldValue::as_field_value(&record.#ident)
            }
        });

        let set_bytes = if attrs.file.is_some() {
            let set_bytes_fn = format_ident!("__record_set_bytes_{}", ident);
            helpers.push(quote! {
                fn #set_fn(_record: &mut #name, raw: &str) -> ::core::result::Result<(), ::trellis_bind::ValueError> {
                    ::core::result::Result::Err(::trellis_bind::ValueError {
                        value: raw.to_string(),
                        ty: "file field",
                    })
                }
                fn #set_bytes_fn(record: &mut #name, content: ::trellis_bind::__bytes::Bytes) {
                    record.#ident = ::trellis_bind::FromFileBytes::from_file_bytes(content);
                }
            });
            quote! { ::core::option::Option::Some(#set_bytes_fn) }
        } else {
            helpers.push(quote! {
                fn #set_fn(record: &mut #name, raw: &str) -> ::core::result::Result<(), ::trellis_bind::ValueError> {
                    record.#ident = <#ty as ::trellis_bind::FromFieldStr>::from_field_str(raw)?;
                    ::core::result::Result::Ok(())
                }
            });
            quote! { ::core::option::Option::None }
        };

        let source = source_tokens(&attrs);
        let default = option_str(&attrs.default);
        let decrypt = option_str(&attrs.decrypt);
        let file = option_str(&attrs.file);
        let validate = attrs.validate.unwrap_or_default();

        specs.push(quote! {
            ::trellis_bind::FieldSpec {
                name: #field_name,
                source: #source,
                default: #default,
                decrypt: #decrypt,
                validate: #validate,
                file: #file,
                set: #set_fn,
                get: #get_fn,
                set_bytes: #set_bytes,
                nested: ::core::option::Option::None,
            }
        });
    }

    Ok(quote! {
        const _: () = {
            #(#helpers)*

            impl ::trellis_bind::Record for #name {
                const FIELDS: &'static [::trellis_bind::FieldSpec<#name>] = &[
                    #(#specs),*
                ];
            }
        };
    })
}

fn source_tokens(attrs: &FieldAttrs) -> TokenStream {
    if let Some(key) = &attrs.path {
        quote! { ::trellis_bind::Source::Path(#key) }
    } else if let Some(key) = &attrs.query {
        quote! { ::trellis_bind::Source::Query(#key) }
    } else if let Some(key) = &attrs.header {
        quote! { ::trellis_bind::Source::Header(#key) }
    } else if let Some(key) = &attrs.cookie {
        quote! { ::trellis_bind::Source::Cookie(#key) }
    } else {
        quote! { ::trellis_bind::Source::None }
    }
}

fn option_str(value: &Option<String>) -> TokenStream {
    match value {
        Some(v) => quote! { ::core::option::Option::Some(#v) },
        None => quote! { ::core::option::Option::None },
    }
}
