use anyhow::{bail, Error};
use proc_macro2::TokenStream;
use quote::quote;
use syn::Meta;

use crate::field::{check_tag, set_bool, set_option, tag_attr, word_attr, Label};

/// An embedded message field: plain, optional, or repeated.
///
/// A plain message field is always written, even when every nested field
/// holds its default; use `optional` when absence must be representable.
#[derive(Clone)]
pub struct Field {
    pub label: Option<Label>,
    pub tag: u32,
}

impl Field {
    pub fn new(attrs: &[Meta], inferred_tag: Option<u32>) -> Result<Option<Field>, Error> {
        let mut message = false;
        let mut label = None;
        let mut tag = None;

        let mut unknown_attrs = Vec::new();

        for attr in attrs {
            if word_attr("message", attr) {
                set_bool(&mut message, "duplicate message attribute")?;
            } else if let Some(t) = tag_attr(attr)? {
                set_option(&mut tag, t, "duplicate tag attributes")?;
            } else if let Some(l) = Label::from_attr(attr) {
                set_option(&mut label, l, "duplicate label attributes")?;
            } else {
                unknown_attrs.push(attr);
            }
        }

        if !message {
            return Ok(None);
        }

        if !unknown_attrs.is_empty() {
            bail!(
                "unknown attribute(s) for message field: {:?}",
                unknown_attrs
            );
        }

        let tag = check_tag(tag.or(inferred_tag))?;

        Ok(Some(Field { label, tag }))
    }

    pub fn encode(&self, ident: TokenStream) -> TokenStream {
        let tag = self.tag;
        match self.label {
            None => quote! {
                ::wirebuf::encoding::message::encode(#tag, &#ident, buf);
            },
            Some(Label::Optional) => quote! {
                if let ::core::option::Option::Some(ref msg) = #ident {
                    ::wirebuf::encoding::message::encode(#tag, msg, buf);
                }
            },
            Some(Label::Repeated) => quote! {
                ::wirebuf::encoding::message::encode_repeated(#tag, &#ident, buf);
            },
        }
    }

    pub fn merge(&self, ident: TokenStream) -> TokenStream {
        match self.label {
            None => quote! {
                ::wirebuf::encoding::message::merge(wire_type, #ident, buf, ctx)
            },
            Some(Label::Optional) => quote! {
                ::wirebuf::encoding::message::merge(
                    wire_type,
                    #ident.get_or_insert_with(::core::default::Default::default),
                    buf,
                    ctx,
                )
            },
            Some(Label::Repeated) => quote! {
                ::wirebuf::encoding::message::merge_repeated(wire_type, #ident, buf, ctx)
            },
        }
    }

    pub fn encoded_len(&self, ident: TokenStream) -> TokenStream {
        let tag = self.tag;
        match self.label {
            None => quote! {
                ::wirebuf::encoding::message::encoded_len(#tag, &#ident)
            },
            Some(Label::Optional) => quote! {
                #ident.as_ref().map_or(0, |msg| ::wirebuf::encoding::message::encoded_len(#tag, msg))
            },
            Some(Label::Repeated) => quote! {
                ::wirebuf::encoding::message::encoded_len_repeated(#tag, &#ident)
            },
        }
    }

    pub fn clear(&self, ident: TokenStream) -> TokenStream {
        match self.label {
            None => quote!(::wirebuf::Message::clear(&mut #ident)),
            Some(Label::Optional) => quote!(#ident = ::core::option::Option::None),
            Some(Label::Repeated) => quote!(#ident.clear()),
        }
    }
}
