use proc_macro2::TokenStream;
use quote::{format_ident, quote};
use syn::ext::IdentExt;
use syn::{DeriveInput, Type};

use crate::parse_field_attrs;

/// Where a mapped field goes on save.
#[derive(Clone, Copy, PartialEq, Eq)]
pub(crate) enum Kind {
    Content,
    One,
    Many,
}

/// A struct field that takes part in the mapping, in declaration order.
pub(crate) struct MappedField<'a> {
    pub ident: &'a syn::Ident,
    /// Rust name without any `r#` prefix.
    pub name: String,
    /// Content key, or default link tag for link fields.
    pub wire_name: String,
    pub kind: Kind,
}

pub(crate) fn collect_fields(input: &DeriveInput) -> syn::Result<Vec<MappedField<'_>>> {
    let syn::Data::Struct(data) = &input.data else {
        return Err(syn::Error::new_spanned(
            input,
            "Document can only be derived for structs",
        ));
    };
    let syn::Fields::Named(named) = &data.fields else {
        return Err(syn::Error::new_spanned(
            input,
            "Document requires a struct with named fields",
        ));
    };

    let mut fields = Vec::new();
    for field in &named.named {
        let attrs = parse_field_attrs(&field.attrs)?;
        if attrs.skip {
            continue;
        }
        let Some(ident) = field.ident.as_ref() else {
            continue;
        };
        let name = ident.unraw().to_string();
        fields.push(MappedField {
            ident,
            wire_name: attrs.rename.unwrap_or_else(|| name.clone()),
            name,
            kind: classify(&field.ty),
        });
    }
    Ok(fields)
}

/// Link fields are recognized by the last path segment of their type.
fn classify(ty: &Type) -> Kind {
    if let Type::Path(type_path) = ty {
        if let Some(segment) = type_path.path.segments.last() {
            match segment.ident.to_string().as_str() {
                "One" => return Kind::One,
                "Many" => return Kind::Many,
                _ => {}
            }
        }
    }
    Kind::Content
}

/// Generates `fields()`: the static mapping table.
pub(crate) fn generate_table(fields: &[MappedField<'_>]) -> TokenStream {
    let entries = fields.iter().map(|f| {
        let name = &f.name;
        let wire_name = &f.wire_name;
        let kind = match f.kind {
            Kind::Content => format_ident!("Content"),
            Kind::One => format_ident!("One"),
            Kind::Many => format_ident!("Many"),
        };
        quote! {
            ::siloxane_core::FieldSpec {
                name: #name,
                wire_name: #wire_name,
                kind: ::siloxane_core::FieldKind::#kind,
            }
        }
    });

    quote! {
        fn fields() -> &'static [::siloxane_core::FieldSpec] {
            const FIELDS: &[::siloxane_core::FieldSpec] = &[#(#entries),*];
            FIELDS
        }
    }
}

pub(crate) fn generate_content(fields: &[MappedField<'_>]) -> TokenStream {
    let content: Vec<_> = fields.iter().filter(|f| f.kind == Kind::Content).collect();

    let writes = content.iter().map(|f| {
        let ident = f.ident;
        let wire_name = &f.wire_name;
        quote! { out.field(#wire_name, &self.#ident)?; }
    });
    let reads = content.iter().map(|f| {
        let ident = f.ident;
        let wire_name = &f.wire_name;
        quote! {
            if let ::std::option::Option::Some(value) = content.field(#wire_name)? {
                self.#ident = value;
            }
        }
    });

    quote! {
        #[allow(unused_variables)]
        fn encode_content(
            &self,
            out: &mut ::siloxane_core::ContentWriter,
        ) -> ::std::result::Result<(), ::siloxane_core::Error> {
            #(#writes)*
            ::std::result::Result::Ok(())
        }

        #[allow(unused_variables)]
        fn decode_content(
            &mut self,
            content: &::siloxane_core::ContentReader,
        ) -> ::std::result::Result<(), ::siloxane_core::Error> {
            #(#reads)*
            ::std::result::Result::Ok(())
        }
    }
}

pub(crate) fn generate_links(fields: &[MappedField<'_>]) -> TokenStream {
    let links: Vec<_> = fields.iter().filter(|f| f.kind != Kind::Content).collect();

    let writes = links.iter().map(|f| {
        let ident = f.ident;
        let tag = &f.wire_name;
        quote! { ::siloxane_core::LinkField::encode_links(&self.#ident, #tag, out); }
    });
    let reads = links.iter().map(|f| {
        let ident = f.ident;
        let tag = &f.wire_name;
        let name = &f.name;
        quote! {
            ::siloxane_core::LinkField::decode_links(&mut self.#ident, links.matching(#tag, #name));
        }
    });

    quote! {
        #[allow(unused_variables)]
        fn encode_links(&self, out: &mut ::siloxane_core::LinkWriter) {
            #(#writes)*
        }

        #[allow(unused_variables)]
        fn decode_links(&mut self, links: &::siloxane_core::LinkReader) {
            #(#reads)*
        }
    }
}
