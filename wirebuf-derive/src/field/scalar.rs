use anyhow::{bail, Error};
use proc_macro2::{Span, TokenStream};
use quote::quote;
use syn::{parse_str, Expr, ExprLit, Ident, Lit, Meta, MetaNameValue, Path};

use crate::field::{bool_attr, check_tag, set_option, tag_attr, Label};

/// A scalar field.
#[derive(Clone)]
pub struct Field {
    pub ty: Ty,
    pub kind: Kind,
    pub tag: u32,
}

impl Field {
    pub fn new(attrs: &[Meta], inferred_tag: Option<u32>) -> Result<Option<Field>, Error> {
        let mut ty = None;
        let mut label = None;
        let mut packed = None;
        let mut tag = None;

        let mut unknown_attrs = Vec::new();

        for attr in attrs {
            if let Some(t) = Ty::from_attr(attr)? {
                set_option(&mut ty, t, "duplicate type attributes")?;
            } else if let Some(p) = bool_attr("packed", attr)? {
                set_option(&mut packed, p, "duplicate packed attributes")?;
            } else if let Some(t) = tag_attr(attr)? {
                set_option(&mut tag, t, "duplicate tag attributes")?;
            } else if let Some(l) = Label::from_attr(attr) {
                set_option(&mut label, l, "duplicate label attributes")?;
            } else {
                unknown_attrs.push(attr);
            }
        }

        let ty = match ty {
            Some(ty) => ty,
            None => return Ok(None),
        };

        if !unknown_attrs.is_empty() {
            bail!("unknown attribute(s) for scalar field: {:?}", unknown_attrs);
        }

        let tag = check_tag(tag.or(inferred_tag))?;

        let kind = match (label, packed) {
            (None | Some(Label::Optional), Some(_)) => {
                bail!("packed attribute may only be applied to repeated fields")
            }
            (Some(Label::Repeated), Some(true)) if !ty.is_numeric() => {
                bail!("packed attribute may only be applied to numeric types")
            }
            (None, None) => Kind::Plain,
            (Some(Label::Optional), None) => Kind::Optional,
            (Some(Label::Repeated), packed) if packed.unwrap_or(ty.is_numeric()) => Kind::Packed,
            (Some(Label::Repeated), _) => Kind::Repeated,
        };

        Ok(Some(Field { ty, kind, tag }))
    }

    /// Returns a statement which encodes the scalar field.
    pub fn encode(&self, ident: TokenStream) -> TokenStream {
        let module = self.ty.module();
        let tag = self.tag;
        match self.kind {
            Kind::Plain => {
                let is_default = self.ty.is_default_expr(&ident);
                quote! {
                    if !(#is_default) {
                        ::wirebuf::encoding::#module::encode(#tag, &#ident, buf);
                    }
                }
            }
            Kind::Optional => quote! {
                if let ::core::option::Option::Some(ref value) = #ident {
                    ::wirebuf::encoding::#module::encode(#tag, value, buf);
                }
            },
            Kind::Repeated => quote! {
                ::wirebuf::encoding::#module::encode_repeated(#tag, &#ident, buf);
            },
            Kind::Packed => quote! {
                ::wirebuf::encoding::#module::encode_packed(#tag, &#ident, buf);
            },
        }
    }

    /// Returns an expression which evaluates to the result of merging a
    /// decoded scalar value into the field.
    pub fn merge(&self, ident: TokenStream) -> TokenStream {
        let module = self.ty.module();
        match self.kind {
            Kind::Plain => quote! {
                ::wirebuf::encoding::#module::merge(wire_type, #ident, buf, ctx)
            },
            Kind::Optional => quote! {
                ::wirebuf::encoding::#module::merge(
                    wire_type,
                    #ident.get_or_insert_with(::core::default::Default::default),
                    buf,
                    ctx,
                )
            },
            Kind::Repeated | Kind::Packed => quote! {
                ::wirebuf::encoding::#module::merge_repeated(wire_type, #ident, buf, ctx)
            },
        }
    }

    /// Returns an expression which evaluates to the encoded length of the
    /// field.
    pub fn encoded_len(&self, ident: TokenStream) -> TokenStream {
        let module = self.ty.module();
        let tag = self.tag;
        match self.kind {
            Kind::Plain => {
                let is_default = self.ty.is_default_expr(&ident);
                quote! {
                    if !(#is_default) {
                        ::wirebuf::encoding::#module::encoded_len(#tag, &#ident)
                    } else {
                        0
                    }
                }
            }
            Kind::Optional => quote! {
                #ident.as_ref().map_or(0, |value| ::wirebuf::encoding::#module::encoded_len(#tag, value))
            },
            Kind::Repeated => quote! {
                ::wirebuf::encoding::#module::encoded_len_repeated(#tag, &#ident)
            },
            Kind::Packed => quote! {
                ::wirebuf::encoding::#module::encoded_len_packed(#tag, &#ident)
            },
        }
    }

    /// Returns a statement which resets the field to its default.
    pub fn clear(&self, ident: TokenStream) -> TokenStream {
        match self.kind {
            Kind::Plain => match self.ty {
                Ty::String | Ty::Bytes => quote!(#ident.clear()),
                _ => quote!(#ident = ::core::default::Default::default()),
            },
            Kind::Optional => quote!(#ident = ::core::option::Option::None),
            Kind::Repeated | Kind::Packed => quote!(#ident.clear()),
        }
    }

    /// Returns typed accessor methods for enumeration fields, which are
    /// stored as open `i32` values.
    pub fn methods(&self, ident: &TokenStream) -> Option<TokenStream> {
        let ty = match &self.ty {
            Ty::Enumeration(ty) => ty,
            _ => return None,
        };
        // Tuple-struct indices make no method names.
        let field: Ident = parse_str(&ident.to_string()).ok()?;
        let set = Ident::new(&format!("set_{field}"), Span::call_site());
        Some(match self.kind {
            Kind::Plain => quote! {
                pub fn #field(&self) -> #ty {
                    <#ty as ::core::convert::TryFrom<i32>>::try_from(self.#field).unwrap_or_default()
                }

                pub fn #set(&mut self, value: #ty) {
                    self.#field = value as i32;
                }
            },
            Kind::Optional => quote! {
                pub fn #field(&self) -> #ty {
                    self.#field
                        .and_then(|value| <#ty as ::core::convert::TryFrom<i32>>::try_from(value).ok())
                        .unwrap_or_default()
                }

                pub fn #set(&mut self, value: #ty) {
                    self.#field = ::core::option::Option::Some(value as i32);
                }
            },
            Kind::Repeated | Kind::Packed => {
                let push = Ident::new(&format!("push_{field}"), Span::call_site());
                quote! {
                    pub fn #field(&self) -> ::core::iter::FilterMap<
                        ::core::iter::Cloned<::core::slice::Iter<'_, i32>>,
                        fn(i32) -> ::core::option::Option<#ty>,
                    > {
                        self.#field.iter().cloned().filter_map(|value| {
                            <#ty as ::core::convert::TryFrom<i32>>::try_from(value).ok()
                        })
                    }

                    pub fn #push(&mut self, value: #ty) {
                        self.#field.push(value as i32);
                    }
                }
            }
        })
    }
}

/// A scalar field type.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Ty {
    Double,
    Float,
    Int32,
    Int64,
    Uint32,
    Uint64,
    Sint32,
    Sint64,
    Fixed32,
    Fixed64,
    Sfixed32,
    Sfixed64,
    Bool,
    String,
    Bytes,
    Enumeration(Path),
}

impl Ty {
    pub fn from_attr(attr: &Meta) -> Result<Option<Ty>, Error> {
        let ty = match attr {
            Meta::Path(name) if name.is_ident("float") => Ty::Float,
            Meta::Path(name) if name.is_ident("double") => Ty::Double,
            Meta::Path(name) if name.is_ident("int32") => Ty::Int32,
            Meta::Path(name) if name.is_ident("int64") => Ty::Int64,
            Meta::Path(name) if name.is_ident("uint32") => Ty::Uint32,
            Meta::Path(name) if name.is_ident("uint64") => Ty::Uint64,
            Meta::Path(name) if name.is_ident("sint32") => Ty::Sint32,
            Meta::Path(name) if name.is_ident("sint64") => Ty::Sint64,
            Meta::Path(name) if name.is_ident("fixed32") => Ty::Fixed32,
            Meta::Path(name) if name.is_ident("fixed64") => Ty::Fixed64,
            Meta::Path(name) if name.is_ident("sfixed32") => Ty::Sfixed32,
            Meta::Path(name) if name.is_ident("sfixed64") => Ty::Sfixed64,
            Meta::Path(name) if name.is_ident("bool") => Ty::Bool,
            Meta::Path(name) if name.is_ident("string") => Ty::String,
            Meta::Path(name) if name.is_ident("bytes") => Ty::Bytes,
            Meta::NameValue(MetaNameValue {
                path,
                value:
                    Expr::Lit(ExprLit {
                        lit: Lit::Str(lit), ..
                    }),
                ..
            }) if path.is_ident("enumeration") => Ty::Enumeration(parse_str::<Path>(&lit.value())?),
            Meta::List(meta_list) if meta_list.path.is_ident("enumeration") => {
                Ty::Enumeration(meta_list.parse_args::<Path>()?)
            }
            _ => return Ok(None),
        };
        Ok(Some(ty))
    }

    pub fn from_str(s: &str) -> Result<Ty, Error> {
        let enumeration_len = "enumeration".len();
        let ty = match s.trim() {
            "float" => Ty::Float,
            "double" => Ty::Double,
            "int32" => Ty::Int32,
            "int64" => Ty::Int64,
            "uint32" => Ty::Uint32,
            "uint64" => Ty::Uint64,
            "sint32" => Ty::Sint32,
            "sint64" => Ty::Sint64,
            "fixed32" => Ty::Fixed32,
            "fixed64" => Ty::Fixed64,
            "sfixed32" => Ty::Sfixed32,
            "sfixed64" => Ty::Sfixed64,
            "bool" => Ty::Bool,
            "string" => Ty::String,
            "bytes" => Ty::Bytes,
            s if s.len() > enumeration_len && &s[..enumeration_len] == "enumeration" => {
                let s = s[enumeration_len..].trim();
                match s.chars().next() {
                    Some('<') | Some('(') => (),
                    _ => bail!("invalid type: {}", s),
                }
                match s.chars().next_back() {
                    Some('>') | Some(')') => (),
                    _ => bail!("invalid type: {}", s),
                }
                Ty::Enumeration(parse_str::<Path>(s[1..s.len() - 1].trim())?)
            }
            s => bail!("invalid type: {}", s),
        };
        Ok(ty)
    }

    /// Returns the name of the encoding module the type dispatches to.
    /// Enumerations travel as their underlying `int32`.
    pub fn module(&self) -> Ident {
        match self {
            Ty::Enumeration(..) => Ident::new("int32", Span::call_site()),
            _ => Ident::new(self.as_str(), Span::call_site()),
        }
    }

    /// Returns the type as it appears in field declarations.
    pub fn as_str(&self) -> &'static str {
        match self {
            Ty::Double => "double",
            Ty::Float => "float",
            Ty::Int32 => "int32",
            Ty::Int64 => "int64",
            Ty::Uint32 => "uint32",
            Ty::Uint64 => "uint64",
            Ty::Sint32 => "sint32",
            Ty::Sint64 => "sint64",
            Ty::Fixed32 => "fixed32",
            Ty::Fixed64 => "fixed64",
            Ty::Sfixed32 => "sfixed32",
            Ty::Sfixed64 => "sfixed64",
            Ty::Bool => "bool",
            Ty::String => "string",
            Ty::Bytes => "bytes",
            Ty::Enumeration(..) => "enum",
        }
    }

    /// Returns an expression testing whether the field holds its default
    /// value.
    pub fn is_default_expr(&self, ident: &TokenStream) -> TokenStream {
        match self {
            Ty::String | Ty::Bytes => quote!(#ident.is_empty()),
            Ty::Float => quote!(#ident == 0f32),
            Ty::Double => quote!(#ident == 0f64),
            Ty::Bool => quote!(!#ident),
            Ty::Int32 | Ty::Sint32 | Ty::Sfixed32 => quote!(#ident == 0i32),
            Ty::Int64 | Ty::Sint64 | Ty::Sfixed64 => quote!(#ident == 0i64),
            Ty::Uint32 | Ty::Fixed32 => quote!(#ident == 0u32),
            Ty::Uint64 | Ty::Fixed64 => quote!(#ident == 0u64),
            Ty::Enumeration(..) => quote!(#ident == 0i32),
        }
    }

    /// Returns false if the scalar type is length delimited, i.e. `string`
    /// or `bytes`.
    pub fn is_numeric(&self) -> bool {
        !matches!(self, Ty::String | Ty::Bytes)
    }
}

/// The shape of a scalar field.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Kind {
    /// A plain scalar field, omitted from the output when it holds its
    /// default value.
    Plain,
    /// An optional scalar field; `None` is omitted, a present value is
    /// always written.
    Optional,
    /// A repeated scalar field written one tag per element.
    Repeated,
    /// A repeated numeric field written as a single length-delimited run.
    Packed,
}
