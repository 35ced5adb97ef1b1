use proc_macro::TokenStream;
use quote::quote;
use syn::{DeriveInput, parse_macro_input};

mod fields;

/// Derive macro for the Document trait.
///
/// Generates the field-mapping table plus `encode_content()`,
/// `decode_content()`, `encode_links()` and `decode_links()`. Fields typed
/// `One<_>` or `Many<_>` go to the link side channel; every other field must
/// be `Serialize + DeserializeOwned` and goes to the content body, in
/// declaration order.
///
/// # Example
///
/// ```ignore
/// use siloxane_core::{Document, One};
///
/// #[derive(Debug, Clone, Default, Document)]
/// struct Doc {
///     #[document(rename = "string_field")]
///     field_s: String,
///     #[document(rename = "tag_as_parent")]
///     parent: One<Doc>,
/// }
/// ```
///
/// # Attributes
///
/// - `#[document(rename = "name")]` - Content key, or link tag for link fields
/// - `#[document(skip)]` - Leave the field out of the mapping (kept at `Default` on load)
/// - `#[document(resolve)]` on the struct - The type implements `Resolve`
#[proc_macro_derive(Document, attributes(document))]
pub fn derive_document(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);

    match derive_document_impl(&input) {
        Ok(tokens) => tokens.into(),
        Err(err) => err.to_compile_error().into(),
    }
}

fn derive_document_impl(input: &DeriveInput) -> syn::Result<proc_macro2::TokenStream> {
    let name = &input.ident;
    let (impl_generics, ty_generics, where_clause) = input.generics.split_for_impl();

    let container = parse_container_attrs(&input.attrs)?;
    let mapped = fields::collect_fields(input)?;

    let table_impl = fields::generate_table(&mapped);
    let content_impl = fields::generate_content(&mapped);
    let links_impl = fields::generate_links(&mapped);
    let resolver_impl = if container.resolve {
        quote! {
            fn as_resolver(&mut self) -> ::std::option::Option<&mut dyn ::siloxane_core::Resolve> {
                ::std::option::Option::Some(self)
            }
        }
    } else {
        quote! {}
    };

    Ok(quote! {
        impl #impl_generics ::siloxane_core::Document for #name #ty_generics #where_clause {
            #table_impl
            #content_impl
            #links_impl
            #resolver_impl
        }
    })
}

#[derive(Default)]
struct ContainerAttrs {
    resolve: bool,
}

fn parse_container_attrs(attrs: &[syn::Attribute]) -> syn::Result<ContainerAttrs> {
    let mut result = ContainerAttrs::default();

    for attr in attrs {
        if !attr.path().is_ident("document") {
            continue;
        }

        attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("resolve") {
                result.resolve = true;
                Ok(())
            } else {
                Err(meta.error("unknown document attribute; expected `resolve`"))
            }
        })?;
    }

    Ok(result)
}

#[derive(Default)]
pub(crate) struct FieldAttrs {
    pub skip: bool,
    pub rename: Option<String>,
}

pub(crate) fn parse_field_attrs(attrs: &[syn::Attribute]) -> syn::Result<FieldAttrs> {
    let mut result = FieldAttrs::default();

    for attr in attrs {
        if !attr.path().is_ident("document") {
            continue;
        }

        attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("skip") {
                result.skip = true;
            } else if meta.path.is_ident("rename") {
                let value: syn::LitStr = meta.value()?.parse()?;
                result.rename = Some(value.value());
            } else {
                return Err(meta.error("unknown document attribute; expected `skip` or `rename`"));
            }
            Ok(())
        })?;
    }

    Ok(result)
}
