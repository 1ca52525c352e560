use anyhow::{bail, Error};
use proc_macro2::{Span, TokenStream};
use quote::quote;
use syn::{Expr, ExprLit, Ident, Lit, Meta, MetaNameValue};

use crate::field::{check_tag, scalar, set_option, tag_attr};

/// The Rust container backing a map field.
#[derive(Clone, Debug)]
pub enum MapTy {
    HashMap,
    BTreeMap,
}

impl MapTy {
    fn from_str(s: &str) -> Option<MapTy> {
        match s {
            "map" | "hash_map" => Some(MapTy::HashMap),
            "btree_map" => Some(MapTy::BTreeMap),
            _ => None,
        }
    }

    fn module(&self) -> Ident {
        match self {
            MapTy::HashMap => Ident::new("hash_map", Span::call_site()),
            MapTy::BTreeMap => Ident::new("btree_map", Span::call_site()),
        }
    }
}

/// A map field, encoded as repeated `{1: key, 2: value}` entries.
#[derive(Clone)]
pub struct Field {
    pub map_ty: MapTy,
    pub key_ty: scalar::Ty,
    pub value_ty: ValueTy,
    pub tag: u32,
}

impl Field {
    pub fn new(attrs: &[Meta], inferred_tag: Option<u32>) -> Result<Option<Field>, Error> {
        let mut types = None;
        let mut tag = None;

        let mut unknown_attrs = Vec::new();

        for attr in attrs {
            if let Some(t) = tag_attr(attr)? {
                set_option(&mut tag, t, "duplicate tag attributes")?;
            } else if let Some(map_ty) = attr
                .path()
                .get_ident()
                .and_then(|ident| MapTy::from_str(&ident.to_string()))
            {
                let (k, v) = match attr {
                    Meta::NameValue(MetaNameValue {
                        value:
                            Expr::Lit(ExprLit {
                                lit: Lit::Str(lit), ..
                            }),
                        ..
                    }) => {
                        let types = lit.value();
                        let mut items = types.split(',');
                        let k = match items.next() {
                            Some(k) => k.to_string(),
                            None => bail!("invalid map attribute: must have key and value types"),
                        };
                        let v = match items.next() {
                            Some(v) => v.to_string(),
                            None => bail!("invalid map attribute: must have key and value types"),
                        };
                        if items.next().is_some() {
                            bail!("invalid map attribute: {:?}", attr);
                        }
                        (k, v)
                    }
                    _ => bail!("invalid map attribute: {:?}", attr),
                };
                set_option(
                    &mut types,
                    (map_ty, key_ty_from_str(&k)?, ValueTy::from_str(&v)?),
                    "duplicate map type attribute",
                )?;
            } else {
                unknown_attrs.push(attr);
            }
        }

        let (map_ty, key_ty, value_ty) = match types {
            Some(types) => types,
            None => return Ok(None),
        };

        if !unknown_attrs.is_empty() {
            bail!("unknown attribute(s) for map field: {:?}", unknown_attrs);
        }

        let tag = check_tag(tag.or(inferred_tag))?;

        Ok(Some(Field {
            map_ty,
            key_ty,
            value_ty,
            tag,
        }))
    }

    /// Returns a statement which encodes the map field.
    pub fn encode(&self, ident: TokenStream) -> TokenStream {
        let tag = self.tag;
        let module = self.map_ty.module();
        let key_mod = self.key_ty.module();
        let ke = quote!(::wirebuf::encoding::#key_mod::encode);
        let kl = quote!(::wirebuf::encoding::#key_mod::encoded_len);
        let (ve, vl) = self.value_fns();
        quote! {
            ::wirebuf::encoding::#module::encode(#ke, #kl, #ve, #vl, #tag, &#ident, buf);
        }
    }

    /// Returns an expression which evaluates to the result of merging a
    /// decoded map entry into the field.
    pub fn merge(&self, ident: TokenStream) -> TokenStream {
        let module = self.map_ty.module();
        let key_mod = self.key_ty.module();
        let km = quote!(::wirebuf::encoding::#key_mod::merge);
        let vm = match &self.value_ty {
            ValueTy::Scalar(ty) => {
                let val_mod = ty.module();
                quote!(::wirebuf::encoding::#val_mod::merge)
            }
            ValueTy::Message => quote!(::wirebuf::encoding::message::merge),
        };
        quote! {
            ::wirebuf::encoding::#module::merge(#km, #vm, wire_type, #ident, buf, ctx)
        }
    }

    /// Returns an expression which evaluates to the encoded length of the
    /// map field.
    pub fn encoded_len(&self, ident: TokenStream) -> TokenStream {
        let tag = self.tag;
        let module = self.map_ty.module();
        let key_mod = self.key_ty.module();
        let kl = quote!(::wirebuf::encoding::#key_mod::encoded_len);
        let (_, vl) = self.value_fns();
        quote! {
            ::wirebuf::encoding::#module::encoded_len(#kl, #vl, #tag, &#ident)
        }
    }

    pub fn clear(&self, ident: TokenStream) -> TokenStream {
        quote!(#ident.clear())
    }

    fn value_fns(&self) -> (TokenStream, TokenStream) {
        match &self.value_ty {
            ValueTy::Scalar(ty) => {
                let val_mod = ty.module();
                (
                    quote!(::wirebuf::encoding::#val_mod::encode),
                    quote!(::wirebuf::encoding::#val_mod::encoded_len),
                )
            }
            ValueTy::Message => (
                quote!(::wirebuf::encoding::message::encode),
                quote!(::wirebuf::encoding::message::encoded_len),
            ),
        }
    }
}

/// The value half of a map declaration: a scalar (including enumerations,
/// which travel as `i32`) or a nested message.
#[derive(Clone, Debug)]
pub enum ValueTy {
    Scalar(scalar::Ty),
    Message,
}

impl ValueTy {
    fn from_str(s: &str) -> Result<ValueTy, Error> {
        let s = s.trim();
        if s == "message" {
            Ok(ValueTy::Message)
        } else {
            Ok(ValueTy::Scalar(scalar::Ty::from_str(s)?))
        }
    }
}

/// Map keys are restricted to integral, boolean and string types.
fn key_ty_from_str(s: &str) -> Result<scalar::Ty, Error> {
    let ty = scalar::Ty::from_str(s)?;
    match ty {
        scalar::Ty::Int32
        | scalar::Ty::Int64
        | scalar::Ty::Uint32
        | scalar::Ty::Uint64
        | scalar::Ty::Sint32
        | scalar::Ty::Sint64
        | scalar::Ty::Fixed32
        | scalar::Ty::Fixed64
        | scalar::Ty::Sfixed32
        | scalar::Ty::Sfixed64
        | scalar::Ty::Bool
        | scalar::Ty::String => Ok(ty),
        _ => bail!("invalid map key type: {}", s),
    }
}
